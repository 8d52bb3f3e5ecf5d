//! # coin_news
//!
//! Retrieves the news listing for one or more CoinMarketCap coin pages,
//! extracts structured news items from markup whose layout drifts between
//! deployments, normalizes their timestamps and keeps the items published
//! within a date range.
//!
//! ## Usage
//!
//! ```sh
//! coin_news --start 2024-01-01 --end 2024-01-07 -j ./json -x ./exports \
//!     https://coinmarketcap.com/currencies/bitcoin/
//! ```
//!
//! ## Architecture
//!
//! Each URL runs through the same pipeline:
//! 1. **Canonicalize**: reduce the URL to `/currencies/<slug>`
//! 2. **Retrieve**: fetch the listing (direct, proxy or news API) with retries
//! 3. **Extract**: locate the news section and items via ordered pattern cascades
//! 4. **Filter**: de-duplicate and keep items inside the date range
//! 5. **Output**: print a summary, then write JSON and spreadsheet files

use chrono::Utc;
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod extract;
mod models;
mod outputs;
mod pipeline;
mod retrieval;
mod target;
mod temporal;
mod utils;

use cli::Cli;
use config::AppConfig;
use models::DateRange;
use outputs::json::{FailedQuery, QueryOutput};
use outputs::{json, spreadsheet};
use pipeline::{Pipeline, PipelineReport, Progress, ProgressEvent};
use retrieval::{HttpRetriever, RetryRetrieve};
use utils::ensure_writable_dir;

const DISPLAY_TIME_FORMAT: &str = "%Y/%-m/%-d %H:%M:%S";

/// Reports pipeline progress through the log.
struct LogProgress;

impl Progress for LogProgress {
    fn report(&self, event: &ProgressEvent) {
        info!(stage = ?event.stage, percent = event.percent, message = %event.message, "Progress");
    }
}

fn print_report(report: &PipelineReport) {
    println!("== {} ({}) ==", report.coin, report.url);
    println!("{}", report.message());
    for item in &report.items {
        println!(
            "{}  [{}]  {}",
            item.published_at.format(DISPLAY_TIME_FORMAT),
            item.source,
            item.title
        );
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("coin_news starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(urls = ?args.urls, ?args.start, ?args.end, "Parsed CLI arguments");

    // ---- Load config ----
    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_cli(&args);
    info!(config_path = ?args.config, route = ?config.route, "Loaded configuration");
    debug!(?config, "Resolved configuration");

    let today = Utc::now().date_naive();
    let range = DateRange::from_days(args.start.unwrap_or(today), args.end.unwrap_or(today));
    if range.start > range.end {
        warn!(start = %range.start, end = %range.end, "Start date is after end date; nothing will match");
    }

    // Early check: ensure output dirs are writable
    for dir in [&args.json_output_dir, &args.export_dir].into_iter().flatten() {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Build pipeline ----
    let retriever = HttpRetriever::new(config.build_route()?, config.timeout(), &config.user_agent)?;
    info!(route = ?retriever.route(), timeout = ?config.timeout(), "Retriever ready");
    let retry = RetryRetrieve::new(retriever)
        .max_attempts(config.max_attempts)
        .base_delay(config.base_delay())
        .max_jitter(config.max_jitter())
        .deadline(config.deadline());
    let pipeline = Pipeline::new(retry).with_unknown_source(&config.unknown_source);

    // ---- Run each URL in turn ----
    let pipeline = &pipeline;
    let range_ref = &range;
    let runs: Vec<_> = stream::iter(&args.urls)
        .then(move |url| async move { (url, pipeline.run(url, range_ref, &LogProgress).await) })
        .collect()
        .await;

    let mut output = QueryOutput::new(range);
    for (url, outcome) in runs {
        match outcome {
            Ok(report) => {
                print_report(&report);
                output.results.push(report);
            }
            Err(e) => {
                let report = e.to_report(url, config.development);
                error!(
                    %url,
                    kind = report.kind,
                    report = %serde_json::to_string(&report)?,
                    "Query failed"
                );
                eprintln!("{url}: {}", report.message);
                output.failures.push(FailedQuery {
                    url: url.clone(),
                    report,
                });
            }
        }
    }

    info!(
        succeeded = output.results.len(),
        failed = output.failures.len(),
        items = output.item_count(),
        "Completed all queries"
    );

    // ---- Outputs ----
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = json::write_results(&output, dir).await {
            error!(error = %e, "Failed to write JSON results");
        }
    }

    if let Some(dir) = &args.export_dir {
        let items: Vec<_> = output
            .results
            .iter()
            .flat_map(|r| r.items.iter().cloned())
            .collect();
        if items.is_empty() {
            warn!("No items to export; skipping spreadsheet");
        } else if let Err(e) =
            spreadsheet::write_workbook(&items, range.start_day(), config.export_locale, dir).await
        {
            error!(error = %e, "Failed to write spreadsheet export");
        }
    }

    let elapsed = start_time.elapsed();
    info!(elapsed_secs = elapsed.as_secs_f64(), "coin_news finished");

    if output.results.is_empty() {
        return Err(format!("all {} queries failed", output.failures.len()).into());
    }
    Ok(())
}
