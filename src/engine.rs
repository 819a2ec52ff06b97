//! Level derivation engine.
//!
//! One scan over the strike table produces the aggregates and candidate
//! buckets, then a fixed-order emission pass builds the level list. The
//! emission order matters: it is the only tie-break for the keep-first dedup
//! by strike and for equal-importance ordering after the final sort.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;

use crate::models::{
    prior_from_row, resolve_major, DerivedLevels, GexSnapshot, Level, LevelKind, StrikeExposure,
    CALL_WALL_OI_KEYS, CALL_WALL_VOL_KEYS, PUT_WALL_OI_KEYS, PUT_WALL_VOL_KEYS,
};

/// Which sign of `total_gex` counts as call-side resistance. The source data
/// convention has flipped between upstream versions, so it is an explicit
/// parameter instead of a guess. `Negative` is the convention the upstream
/// feed currently uses: dealer short gamma above spot prints negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResistanceSign {
    Negative,
    Positive,
}

impl ResistanceSign {
    pub fn is_resistance(self, total_gex: f64) -> bool {
        match self {
            ResistanceSign::Negative => total_gex < 0.0,
            ResistanceSign::Positive => total_gex > 0.0,
        }
    }

    pub fn is_support(self, total_gex: f64) -> bool {
        match self {
            ResistanceSign::Negative => total_gex > 0.0,
            ResistanceSign::Positive => total_gex < 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub resistance_sign: ResistanceSign,
    /// Max percentage distance from spot for an HVL candidate.
    pub hvl_distance_pct: f64,
    /// Min |total_gex| for an HVL candidate.
    pub hvl_min_gex: f64,
    /// Min |total_gex| for the top-strikes ranking.
    pub top_strike_min_gex: f64,
    /// Min |gex_delta| for a vol trigger.
    pub vol_trigger_min_delta: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resistance_sign: ResistanceSign::Negative,
            hvl_distance_pct: 1.5,
            hvl_min_gex: 500.0,
            top_strike_min_gex: 100.0,
            vol_trigger_min_delta: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallCandidate {
    pub strike: f64,
    pub gex: f64,
    pub abs_gex: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HvlCandidate {
    pub strike: f64,
    pub abs_gex: f64,
    pub distance_pct: f64,
}

/// Aggregates and candidate buckets from one pass over the strike table.
/// Owned per run; concurrent derivations never share one.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub call_res_total: f64,
    pub put_sup_total: f64,
    /// Top candidates by |gex| descending, at most [`MAX_WALLS_PER_SIDE`].
    pub call_walls: Vec<WallCandidate>,
    pub put_walls: Vec<WallCandidate>,
    /// At most [`MAX_HVL`], by |gex| descending.
    pub hvl_levels: Vec<HvlCandidate>,
}

pub const MAX_WALLS_PER_SIDE: usize = 5;
pub const MAX_HVL: usize = 3;

const MAX_TOP_STRIKES: usize = 15;
const MAX_ZERO_DTE_WALLS: usize = 2;
const VOL_TRIGGER_INTERVALS: &[&str] = &["1min", "5min", "10min", "15min", "30min", "1h"];

fn strike_key(strike: f64) -> i64 {
    (strike * 100.0).round() as i64
}

fn by_abs_gex_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Single pass over the parsed strikes: accumulate the resistance/support
/// totals and bucket wall and HVL candidates.
pub fn scan_strikes(exposures: &[StrikeExposure], spot: f64, cfg: &EngineConfig) -> ScanSummary {
    let mut summary = ScanSummary::default();

    for exp in exposures {
        let total = exp.total_gex();
        let abs_total = total.abs();

        if exp.strike > spot && cfg.resistance_sign.is_resistance(total) {
            summary.call_res_total += total;
        } else if exp.strike < spot && cfg.resistance_sign.is_support(total) {
            summary.put_sup_total += abs_total;
        }

        if cfg.resistance_sign.is_resistance(total) {
            summary.call_walls.push(WallCandidate { strike: exp.strike, gex: total, abs_gex: abs_total });
        } else if cfg.resistance_sign.is_support(total) {
            summary.put_walls.push(WallCandidate { strike: exp.strike, gex: total, abs_gex: abs_total });
        }

        if spot > 0.0 {
            let distance_pct = ((exp.strike - spot) / spot * 100.0).abs();
            if distance_pct < cfg.hvl_distance_pct && abs_total > cfg.hvl_min_gex {
                summary.hvl_levels.push(HvlCandidate { strike: exp.strike, abs_gex: abs_total, distance_pct });
            }
        }
    }

    // Stable sorts: ties keep input order
    summary.call_walls.sort_by(|a, b| by_abs_gex_desc(a.abs_gex, b.abs_gex));
    summary.put_walls.sort_by(|a, b| by_abs_gex_desc(a.abs_gex, b.abs_gex));
    summary.hvl_levels.sort_by(|a, b| by_abs_gex_desc(a.abs_gex, b.abs_gex));

    summary.call_walls.truncate(MAX_WALLS_PER_SIDE);
    summary.put_walls.truncate(MAX_WALLS_PER_SIDE);
    summary.hvl_levels.truncate(MAX_HVL);

    summary
}

/// Derive the ranked, deduplicated level list for one snapshot.
///
/// Emission order is fixed; see the module docs. The result is sorted by
/// importance descending with emission order preserved among equals, and an
/// empty list is a valid outcome the caller is free to skip over.
pub fn derive_levels(
    snapshot: &GexSnapshot,
    overlay: Option<&Value>,
    cfg: &EngineConfig,
) -> DerivedLevels {
    let exposures = snapshot.exposures();
    let spot = snapshot.spot;
    let summary = scan_strikes(&exposures, spot, cfg);
    let dte = dte_tag(snapshot.min_dte);

    let mut levels: Vec<Level> = Vec::new();

    // 1. Zero gamma flip
    if snapshot.zero_gamma != 0.0 {
        let regime = if spot > snapshot.zero_gamma { "Negative Gamma" } else { "Positive Gamma" };
        levels.push(Level::new(
            snapshot.zero_gamma,
            10,
            LevelKind::GammaFlip,
            "Zero Gamma",
            &dte,
            regime,
        ));
    }

    // 2. Primary gamma walls
    if let Some(cw) = summary.call_walls.first() {
        levels.push(Level::new(
            cw.strike,
            10,
            LevelKind::GammaWallCall,
            "Gamma Wall (Call)",
            &dte,
            format!("{:.0} GEX", cw.abs_gex),
        ));
    }
    if let Some(pw) = summary.put_walls.first() {
        levels.push(Level::new(
            pw.strike,
            10,
            LevelKind::GammaWallPut,
            "Gamma Wall (Put)",
            &dte,
            format!("{:.0} GEX", pw.abs_gex),
        ));
    }

    // 3. High-volatility levels near spot
    for (idx, hvl) in summary.hvl_levels.iter().enumerate() {
        levels.push(Level::new(
            hvl.strike,
            9,
            LevelKind::Hvl,
            format!("HVL #{}", idx + 1),
            &dte,
            format!("{:.0} GEX @ {:.1}% from spot", hvl.abs_gex, hvl.distance_pct),
        ));
    }

    // 4. Same-day-expiry directional walls, drawn from the top-3 per side
    if snapshot.min_dte == 0 {
        let below_spot = summary
            .put_walls
            .iter()
            .take(3)
            .filter(|w| w.strike < spot)
            .take(MAX_ZERO_DTE_WALLS);
        for (idx, ps) in below_spot.enumerate() {
            levels.push(Level::new(
                ps.strike,
                9,
                LevelKind::PutSup0dte,
                format!("PutSup0DTE #{}", idx + 1),
                &dte,
                format!("Support 0DTE: {:.0} GEX", ps.abs_gex),
            ));
        }

        let above_spot = summary
            .call_walls
            .iter()
            .take(3)
            .filter(|w| w.strike > spot)
            .take(MAX_ZERO_DTE_WALLS);
        for (idx, cr) in above_spot.enumerate() {
            levels.push(Level::new(
                cr.strike,
                9,
                LevelKind::CallRes0dte,
                format!("CallRes0DTE #{}", idx + 1),
                &dte,
                format!("Resistance 0DTE: {:.0} GEX", cr.abs_gex),
            ));
        }
    }

    // 5. Externally-computed major walls (volume basis outranks OI basis)
    let majors: [(&[&str], u8, LevelKind, &str); 4] = [
        (CALL_WALL_VOL_KEYS, 9, LevelKind::CallWallApi, "Call Wall (Vol API)"),
        (PUT_WALL_VOL_KEYS, 9, LevelKind::PutWallApi, "Put Wall (Vol API)"),
        (CALL_WALL_OI_KEYS, 8, LevelKind::CallWallApi, "Call Wall (OI API)"),
        (PUT_WALL_OI_KEYS, 8, LevelKind::PutWallApi, "Put Wall (OI API)"),
    ];
    for (keys, importance, kind, label) in majors {
        if let Some(strike) = resolve_major(overlay, snapshot, keys) {
            levels.push(Level::new(strike, importance, kind, label, &dte, "Major from API"));
        }
    }

    // 6. Secondary walls, ranks 2-4 per side
    for (rank, cw) in summary.call_walls.iter().enumerate().skip(1).take(3) {
        levels.push(Level::new(
            cw.strike,
            8,
            LevelKind::CallWall,
            format!("Call Wall #{}", rank + 1),
            &dte,
            format!("{:.0} GEX", cw.abs_gex),
        ));
    }
    for (rank, pw) in summary.put_walls.iter().enumerate().skip(1).take(3) {
        levels.push(Level::new(
            pw.strike,
            8,
            LevelKind::PutWall,
            format!("Put Wall #{}", rank + 1),
            &dte,
            format!("{:.0} GEX", pw.abs_gex),
        ));
    }

    // 7. Top strikes by raw exposure magnitude
    let mut ranked: Vec<&StrikeExposure> = exposures
        .iter()
        .filter(|e| e.total_gex().abs() > cfg.top_strike_min_gex)
        .collect();
    ranked.sort_by(|a, b| by_abs_gex_desc(a.total_gex().abs(), b.total_gex().abs()));
    for exp in ranked.into_iter().take(MAX_TOP_STRIKES) {
        let resist = cfg.resistance_sign.is_resistance(exp.total_gex());
        levels.push(Level::new(
            exp.strike,
            7,
            if resist { LevelKind::StrikeCall } else { LevelKind::StrikePut },
            if resist { "Call Resist" } else { "Put Support" },
            &dte,
            format!("{:.0} GEX", exp.total_gex().abs()),
        ));
    }

    // 8. Volatility triggers. Interval names are positional, so malformed
    // rows are skipped without shifting later intervals.
    for (idx, row) in snapshot.max_priors.iter().take(VOL_TRIGGER_INTERVALS.len()).enumerate() {
        let Some((strike, delta)) = prior_from_row(row) else { continue };
        if strike == 0.0 || delta.abs() <= cfg.vol_trigger_min_delta {
            continue;
        }
        let importance = if delta.abs() > 5000.0 {
            9
        } else if delta.abs() > 2000.0 {
            8
        } else {
            7
        };
        levels.push(Level::new(
            strike,
            importance,
            LevelKind::VolTrigger,
            format!("Vol Trigger ({})", VOL_TRIGGER_INTERVALS[idx]),
            &dte,
            format!("Change: {:+.0}", delta),
        ));
    }

    // 9. Max pain: global minimum |total_gex|, first occurrence wins on ties
    let mut max_pain: Option<(f64, f64)> = None;
    for exp in &exposures {
        let abs_total = exp.total_gex().abs();
        let better = match max_pain {
            Some((_, best)) => abs_total < best,
            None => true,
        };
        if better {
            max_pain = Some((exp.strike, abs_total));
        }
    }
    if let Some((strike, _)) = max_pain {
        if strike != 0.0 {
            levels.push(Level::new(
                strike,
                8,
                LevelKind::MaxPain,
                "Max Pain",
                &dte,
                "Expiration Target",
            ));
        }
    }

    // Finalize: keep-first dedup by rounded strike, then a stable sort by
    // importance so emission order survives among equals.
    let mut seen = HashSet::new();
    levels.retain(|l| seen.insert(strike_key(l.strike)));
    levels.sort_by(|a, b| b.importance.cmp(&a.importance));

    DerivedLevels {
        levels,
        call_res_total: summary.call_res_total,
        put_sup_total: summary.put_sup_total,
    }
}

fn dte_tag(min_dte: i64) -> String {
    format!("{min_dte}DTE")
}
