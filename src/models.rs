use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw GEX snapshot for one ticker / aggregation period.
///
/// `strikes` and `max_priors` come through as loose JSON arrays because the
/// upstream rows vary in arity; individual rows are validated on access and
/// skipped when malformed. Fields we only probe by name (the major-wall
/// aliases) land in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GexSnapshot {
    #[serde(default)]
    pub spot: f64,

    /// Strike at which net dealer gamma flips sign; 0 means unknown.
    #[serde(default)]
    pub zero_gamma: f64,

    /// Days to the nearest expiry in the dataset, 0 = same-day.
    #[serde(default)]
    pub min_dte: i64,

    #[serde(default)]
    pub strikes: Vec<Value>,

    /// Per-interval exposure change series, ordered by increasing lookback.
    #[serde(default)]
    pub max_priors: Vec<Value>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One option strike with its exposure split by basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeExposure {
    pub strike: f64,
    pub gex_volume: f64,
    pub gex_open_interest: f64,
}

impl StrikeExposure {
    pub fn total_gex(&self) -> f64 {
        self.gex_volume + self.gex_open_interest
    }

    /// Parse a raw `[strike, gex_vol, gex_oi, ...]` row. Wrong arity or
    /// non-numeric entries yield `None`.
    pub fn from_row(row: &Value) -> Option<Self> {
        let arr = row.as_array()?;
        if arr.len() < 3 {
            return None;
        }
        Some(Self {
            strike: arr[0].as_f64()?,
            gex_volume: arr[1].as_f64()?,
            gex_open_interest: arr[2].as_f64()?,
        })
    }
}

/// Parse a `[strike, gex_delta, ...]` row from the vol-trigger series.
pub fn prior_from_row(row: &Value) -> Option<(f64, f64)> {
    let arr = row.as_array()?;
    if arr.len() < 2 {
        return None;
    }
    Some((arr[0].as_f64()?, arr[1].as_f64()?))
}

impl GexSnapshot {
    /// Valid strike rows, malformed entries dropped.
    pub fn exposures(&self) -> Vec<StrikeExposure> {
        self.strikes.iter().filter_map(StrikeExposure::from_row).collect()
    }
}

/// Round to 2 decimals; every emitted level strike goes through this.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Level taxonomy. Wire names match the historical CSV `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    #[serde(rename = "gamma_flip")]
    GammaFlip,
    #[serde(rename = "gamma_wall_call")]
    GammaWallCall,
    #[serde(rename = "gamma_wall_put")]
    GammaWallPut,
    #[serde(rename = "hvl")]
    Hvl,
    #[serde(rename = "put_sup_0dte")]
    PutSup0dte,
    #[serde(rename = "call_res_0dte")]
    CallRes0dte,
    #[serde(rename = "call_wall_api")]
    CallWallApi,
    #[serde(rename = "put_wall_api")]
    PutWallApi,
    #[serde(rename = "call_wall")]
    CallWall,
    #[serde(rename = "put_wall")]
    PutWall,
    #[serde(rename = "strike_call")]
    StrikeCall,
    #[serde(rename = "strike_put")]
    StrikePut,
    #[serde(rename = "vol_trigger")]
    VolTrigger,
    #[serde(rename = "max_pain")]
    MaxPain,
}

impl LevelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LevelKind::GammaFlip => "gamma_flip",
            LevelKind::GammaWallCall => "gamma_wall_call",
            LevelKind::GammaWallPut => "gamma_wall_put",
            LevelKind::Hvl => "hvl",
            LevelKind::PutSup0dte => "put_sup_0dte",
            LevelKind::CallRes0dte => "call_res_0dte",
            LevelKind::CallWallApi => "call_wall_api",
            LevelKind::PutWallApi => "put_wall_api",
            LevelKind::CallWall => "call_wall",
            LevelKind::PutWall => "put_wall",
            LevelKind::StrikeCall => "strike_call",
            LevelKind::StrikePut => "strike_put",
            LevelKind::VolTrigger => "vol_trigger",
            LevelKind::MaxPain => "max_pain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "gamma_flip" => LevelKind::GammaFlip,
            "gamma_wall_call" => LevelKind::GammaWallCall,
            "gamma_wall_put" => LevelKind::GammaWallPut,
            "hvl" => LevelKind::Hvl,
            "put_sup_0dte" => LevelKind::PutSup0dte,
            "call_res_0dte" => LevelKind::CallRes0dte,
            "call_wall_api" => LevelKind::CallWallApi,
            "put_wall_api" => LevelKind::PutWallApi,
            "call_wall" => LevelKind::CallWall,
            "put_wall" => LevelKind::PutWall,
            "strike_call" => LevelKind::StrikeCall,
            "strike_put" => LevelKind::StrikePut,
            "vol_trigger" => LevelKind::VolTrigger,
            "max_pain" => LevelKind::MaxPain,
            _ => return None,
        })
    }
}

/// One annotated price level. Value object, rebuilt on every derivation run;
/// carries no identity beyond its rounded strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub strike: f64,
    /// 7..=10, 10 highest.
    pub importance: u8,
    #[serde(rename = "type")]
    pub kind: LevelKind,
    pub label: String,
    pub dte: String,
    pub description: String,
}

impl Level {
    pub fn new(
        strike: f64,
        importance: u8,
        kind: LevelKind,
        label: impl Into<String>,
        dte: &str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            strike: round2(strike),
            importance,
            kind,
            label: label.into(),
            dte: dte.to_string(),
            description: description.into(),
        }
    }
}

/// Ranked level list plus the two running aggregates that ride along as
/// constant columns on every rendered row. Empty `levels` is a valid
/// "no qualifying levels" outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedLevels {
    pub levels: Vec<Level>,
    pub call_res_total: f64,
    pub put_sup_total: f64,
}

impl DerivedLevels {
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

// -----------------------------------------------
// MAJOR WALL FIELD ALIASES
// -----------------------------------------------
// The majors payload has shipped both key spellings over time; probe in
// order, first present non-zero value wins.
pub const CALL_WALL_VOL_KEYS: &[&str] = &["mneg_vol", "major_neg_vol"];
pub const CALL_WALL_OI_KEYS: &[&str] = &["mneg_oi", "major_neg_oi"];
pub const PUT_WALL_VOL_KEYS: &[&str] = &["mpos_vol", "major_pos_vol"];
pub const PUT_WALL_OI_KEYS: &[&str] = &["mpos_oi", "major_pos_oi"];

/// Resolve one major-wall field. A fetched overlay object is authoritative:
/// its fields zero or absent means "feature not present". The snapshot's own
/// loose fields are only probed when no overlay came back at all.
pub fn resolve_major(
    overlay: Option<&Value>,
    snapshot: &GexSnapshot,
    keys: &[&str],
) -> Option<f64> {
    match overlay.and_then(Value::as_object) {
        Some(obj) => probe_keys(obj, keys),
        None => probe_keys(&snapshot.extra, keys),
    }
}

fn probe_keys(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(v) = obj.get(*key).and_then(Value::as_f64) {
            if v != 0.0 {
                return Some(v);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strike_row_parsing() {
        let row = json!([4500.0, -800.0, -200.0]);
        let exp = StrikeExposure::from_row(&row).unwrap();
        assert_eq!(exp.strike, 4500.0);
        assert_eq!(exp.total_gex(), -1000.0);

        // Wrong arity
        assert!(StrikeExposure::from_row(&json!([4500.0, -800.0])).is_none());
        // Non-numeric entry
        assert!(StrikeExposure::from_row(&json!([4500.0, "x", -200.0])).is_none());
        // Not an array at all
        assert!(StrikeExposure::from_row(&json!({"strike": 4500.0})).is_none());
        // Extra trailing elements are fine
        assert!(StrikeExposure::from_row(&json!([4500.0, 1.0, 2.0, 3.0, 4.0])).is_some());
    }

    #[test]
    fn test_level_kind_wire_names_round_trip() {
        let kinds = [
            LevelKind::GammaFlip,
            LevelKind::GammaWallCall,
            LevelKind::GammaWallPut,
            LevelKind::Hvl,
            LevelKind::PutSup0dte,
            LevelKind::CallRes0dte,
            LevelKind::CallWallApi,
            LevelKind::PutWallApi,
            LevelKind::CallWall,
            LevelKind::PutWall,
            LevelKind::StrikeCall,
            LevelKind::StrikePut,
            LevelKind::VolTrigger,
            LevelKind::MaxPain,
        ];
        for kind in kinds {
            assert_eq!(LevelKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(LevelKind::parse("bogus"), None);
    }

    #[test]
    fn test_resolve_major_alias_order() {
        let snapshot: GexSnapshot = serde_json::from_value(json!({
            "spot": 4500.0,
            "strikes": [],
            "mpos_vol": 4480.0
        }))
        .unwrap();

        // Overlay wins over the snapshot fallback
        let overlay = json!({"major_pos_vol": 4470.0});
        assert_eq!(
            resolve_major(Some(&overlay), &snapshot, PUT_WALL_VOL_KEYS),
            Some(4470.0)
        );

        // An overlay with all-zero fields means the feature is not present;
        // it does not fall through to the snapshot
        let overlay = json!({"mpos_vol": 0.0, "major_pos_vol": 0.0});
        assert_eq!(resolve_major(Some(&overlay), &snapshot, PUT_WALL_VOL_KEYS), None);

        // Without an overlay the snapshot's own fields are probed
        assert_eq!(
            resolve_major(None, &snapshot, PUT_WALL_VOL_KEYS),
            Some(4480.0)
        );

        // Nothing anywhere means absent, not zero
        assert_eq!(resolve_major(None, &snapshot, CALL_WALL_OI_KEYS), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(4510.128), 4510.13);
        assert_eq!(round2(4510.0), 4510.0);
        assert_eq!(round2(-0.005), -0.01);
    }
}
