//! JSON output of a query.
//!
//! One file per CLI invocation, holding the successful reports in request
//! order alongside the user-facing reports of the runs that failed:
//!
//! ```text
//! json_output_dir/
//! └── crypto_news_{start}.json
//! ```

use crate::error::FailureReport;
use crate::models::DateRange;
use crate::pipeline::PipelineReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// A run that ended in a failure, as shown to users.
#[derive(Debug, Clone, Serialize)]
pub struct FailedQuery {
    pub url: String,
    #[serde(flatten)]
    pub report: FailureReport,
}

/// Everything one invocation produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<PipelineReport>,
    pub failures: Vec<FailedQuery>,
}

impl QueryOutput {
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            generated_at: Utc::now(),
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Total items across all successful runs.
    pub fn item_count(&self) -> usize {
        self.results.iter().map(|r| r.items.len()).sum()
    }
}

/// Write a [`QueryOutput`] as pretty-printed JSON.
///
/// # Arguments
///
/// * `output` - The query results to serialize
/// * `json_output_dir` - Directory the file is written to; created if missing
///
/// # Returns
///
/// The path of the written file: `{json_output_dir}/crypto_news_{start}.json`.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_results(
    output: &QueryOutput,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(output)?;

    if let Err(e) = fs::create_dir_all(json_output_dir).await {
        error!(%json_output_dir, error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = Path::new(json_output_dir).join(format!(
        "crypto_news_{}.json",
        output.range.start_day()
    ));
    info!(path = %path.display(), "Writing JSON");
    fs::write(&path, json).await?;
    info!(
        path = %path.display(),
        results = output.results.len(),
        failures = output.failures.len(),
        "Wrote JSON results file"
    );

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::{ExtractionStats, NewsItem};
    use chrono::{NaiveDate, TimeZone};

    fn output() -> QueryOutput {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let range = DateRange::from_days(day, day);
        let mut output = QueryOutput::new(range);
        output.results.push(PipelineReport {
            coin: "BITCOIN".to_string(),
            url: "https://coinmarketcap.com/currencies/bitcoin".to_string(),
            range,
            items: vec![NewsItem {
                coin: "BITCOIN".to_string(),
                title: "BTC hits new high".to_string(),
                source: "Unknown".to_string(),
                description: String::new(),
                published_at: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            }],
            stats: ExtractionStats::default(),
        });
        output.failures.push(FailedQuery {
            url: "https://coinmarketcap.com/".to_string(),
            report: PipelineError::InvalidInput("no slug".to_string())
                .to_report("https://coinmarketcap.com/", false),
        });
        output
    }

    #[tokio::test]
    async fn test_write_results_names_file_after_start_day() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().join("nested").to_string_lossy().to_string();

        let path = write_results(&output(), &dir_str).await.unwrap();

        assert!(path.ends_with("crypto_news_2024-01-02.json"));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["results"][0]["items"][0]["publishedAt"], "2024-01-02T10:00:00Z");
        assert_eq!(written["failures"][0]["kind"], "invalid_input");
        assert!(written["failures"][0].get("diagnostics").is_none());
        assert!(written.get("generatedAt").is_some());
    }

    #[test]
    fn test_item_count() {
        assert_eq!(output().item_count(), 1);
    }
}
