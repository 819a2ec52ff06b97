use anyhow::{bail, Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::Path;

use gex_levels::config;
use gex_levels::engine::{derive_levels, EngineConfig};
use gex_levels::gexbot_client::GexBotClient;
use gex_levels::render::{CsvRenderer, LevelRenderer, PineRenderer, RenderMeta};

/// Run the full batch: every ticker times every DTE aggregation period.
async fn run_batch() -> Result<()> {
    println!("{}", "=".repeat(60).blue());
    println!("{}", "GEX Professional Levels".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();

    let client = GexBotClient::from_env()?;
    let engine_cfg = EngineConfig::default();
    let out_dir = config::output_dir();
    let price_multiplier = config::price_multiplier();
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();

    let mut total_files = 0usize;

    for (source, target, description) in config::TICKERS {
        println!(
            "{} Processing {} -> {} ({})",
            "→".cyan(),
            source.yellow(),
            target.yellow(),
            description
        );

        for (endpoint, label) in config::DTE_PERIODS {
            let snapshot = match client.fetch_snapshot(source, endpoint).await {
                Ok(s) if !s.strikes.is_empty() => s,
                Ok(_) => {
                    println!("   {} {}/{}: no strike data", "⚠".yellow(), source, label);
                    continue;
                }
                Err(e) => {
                    println!("   {} {}/{}: {}", "✗".red(), source, label, e);
                    continue;
                }
            };

            // Majors are optional; a failed fetch just means no overlay
            let majors = client.fetch_majors(source, endpoint).await.ok();

            let derived = derive_levels(&snapshot, majors.as_ref(), &engine_cfg);

            if derived.is_empty() {
                println!("   {} {}/{}: no qualifying levels", "⚠".yellow(), target, label);
                continue;
            }

            let meta = RenderMeta {
                symbol: source.to_string(),
                target: target.to_string(),
                dte_label: label.to_string(),
                timestamp: timestamp.clone(),
                price_multiplier,
            };

            let csv = CsvRenderer.render(&derived, &meta);
            let file = Path::new(&out_dir).join(format!("{}_gex_{}.csv", target.to_lowercase(), endpoint));
            std::fs::write(&file, csv)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            println!(
                "   {} {} ({} levels, spot {:.2})",
                "✓".green(),
                file.display(),
                derived.levels.len(),
                snapshot.spot
            );

            if config::render_pine() {
                let pine = PineRenderer.render(&derived, &meta);
                let pine_file =
                    Path::new(&out_dir).join(format!("{}_gex_{}.pine", target.to_lowercase(), endpoint));
                std::fs::write(&pine_file, pine)
                    .with_context(|| format!("Failed to write {}", pine_file.display()))?;
                println!("   {} {}", "✓".green(), pine_file.display());
            }

            total_files += 1;
        }
        println!();
    }

    println!("{}", "=".repeat(60).blue());
    if total_files == 0 {
        bail!("no output files generated");
    }

    // The success marker is only refreshed when something was produced, so a
    // bad run never overwrites the last good timestamp.
    let marker = Path::new(&out_dir).join("last_update.txt");
    std::fs::write(&marker, &timestamp)
        .with_context(|| format!("Failed to write {}", marker.display()))?;

    println!("{} {} files generated", "✓".green(), total_files);
    println!("{}", "=".repeat(60).blue());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    gex_levels::logging::init_logging();
    run_batch().await
}
