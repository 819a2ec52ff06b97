//! Output rendering strategies for a derived level list.
//!
//! The engine stops at `DerivedLevels`; everything here is sink territory:
//! flat CSV for the charting bridge, or the same rows embedded as a string
//! literal inside a generated Pine script. Strikes can be scaled on the way
//! out for the index-vs-future price spread.

use anyhow::{Context, Result};

use crate::models::{round2, DerivedLevels, Level, LevelKind};

pub const CSV_HEADER: &str = "strike,importance,type,label,dte,description,call_res_all,put_sup_all";

/// Context a renderer may fold into its output.
#[derive(Debug, Clone)]
pub struct RenderMeta {
    /// Source index, e.g. SPX.
    pub symbol: String,
    /// Charted instrument, e.g. ES.
    pub target: String,
    /// Aggregation period label: ZERO / ONE / FULL.
    pub dte_label: String,
    pub timestamp: String,
    /// Applied to every strike at render time; 1.0 = no conversion.
    pub price_multiplier: f64,
}

pub trait LevelRenderer {
    fn render(&self, derived: &DerivedLevels, meta: &RenderMeta) -> String;
}

/// The flat format has no quoting; an embedded delimiter in a free-text
/// column would desync the field count on parse.
fn csv_field(s: &str) -> String {
    s.replace(',', ";")
}

fn render_row(level: &Level, derived: &DerivedLevels, multiplier: f64) -> String {
    format!(
        "{:.2},{},{},{},{},{},{:.2},{:.2}",
        round2(level.strike * multiplier),
        level.importance,
        level.kind.as_str(),
        csv_field(&level.label),
        csv_field(&level.dte),
        csv_field(&level.description),
        derived.call_res_total,
        derived.put_sup_total,
    )
}

/// Plain delimited text, header row first.
pub struct CsvRenderer;

impl LevelRenderer for CsvRenderer {
    fn render(&self, derived: &DerivedLevels, meta: &RenderMeta) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for level in &derived.levels {
            out.push_str(&render_row(level, derived, meta.price_multiplier));
            out.push('\n');
        }
        out
    }
}

/// TradingView Pine script with the CSV table embedded as an escaped string
/// literal, ready to paste into the chart editor.
pub struct PineRenderer;

impl LevelRenderer for PineRenderer {
    fn render(&self, derived: &DerivedLevels, meta: &RenderMeta) -> String {
        let csv = CsvRenderer.render(derived, meta);
        let literal = csv
            .trim_end()
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n");

        format!(
            "//@version=5\n\
             indicator(\"GEX Levels - {target} {period}\", overlay=true)\n\
             \n\
             // Source: {symbol}, generated {timestamp}\n\
             // Columns: {header}\n\
             levels_csv = \"{literal}\"\n",
            target = meta.target,
            period = meta.dte_label,
            symbol = meta.symbol,
            timestamp = meta.timestamp,
            header = CSV_HEADER,
            literal = literal,
        )
    }
}

/// Parse a rendered CSV back into a level list. Malformed lines are skipped,
/// mirroring how malformed strike rows are treated on the way in; a missing
/// or foreign header is an error.
pub fn parse_levels(text: &str) -> Result<DerivedLevels> {
    let mut lines = text.lines();
    let header = lines.next().context("empty level document")?;
    if header.trim() != CSV_HEADER {
        anyhow::bail!("unexpected header: {}", header);
    }

    let mut levels = Vec::new();
    let mut call_res_total = 0.0;
    let mut put_sup_total = 0.0;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 8 {
            continue;
        }
        let (Ok(strike), Ok(importance), Some(kind)) = (
            fields[0].parse::<f64>(),
            fields[1].parse::<u8>(),
            LevelKind::parse(fields[2]),
        ) else {
            continue;
        };

        if let Ok(v) = fields[6].parse::<f64>() {
            call_res_total = v;
        }
        if let Ok(v) = fields[7].parse::<f64>() {
            put_sup_total = v;
        }

        levels.push(Level {
            strike,
            importance,
            kind,
            label: fields[3].to_string(),
            dte: fields[4].to_string(),
            description: fields[5].to_string(),
        });
    }

    Ok(DerivedLevels { levels, call_res_total, put_sup_total })
}
