//! Command-line interface definitions for coin_news.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Flags override the values loaded from the optional config file; a few can
//! also be provided via environment variables.

use crate::config::RouteKind;
use crate::outputs::spreadsheet::HeaderLocale;
use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for the coin_news application.
///
/// # Examples
///
/// ```sh
/// # Today's Bitcoin news through the local proxy
/// coin_news https://coinmarketcap.com/currencies/bitcoin/
///
/// # A date range, straight from the news API, exported as a workbook
/// coin_news --route api --start 2024-01-01 --end 2024-01-07 -x ./exports \
///     https://coinmarketcap.com/currencies/ethereum/news/
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Coin page URLs (`https://coinmarketcap.com/currencies/<slug>/`)
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// First day to include (YYYY-MM-DD, UTC). Defaults to today
    #[arg(short, long)]
    pub start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD, UTC). Defaults to today
    #[arg(short, long)]
    pub end: Option<NaiveDate>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// How pages are fetched
    #[arg(long, value_enum)]
    pub route: Option<RouteKind>,

    /// Proxy endpoint used by the `proxy` route
    #[arg(long, env = "COIN_NEWS_PROXY")]
    pub proxy_endpoint: Option<String>,

    /// Output directory for the JSON results file
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Output directory for the spreadsheet export
    #[arg(short = 'x', long)]
    pub export_dir: Option<String>,

    /// Header language for the spreadsheet export
    #[arg(long, value_enum)]
    pub locale: Option<HeaderLocale>,

    /// Include diagnostics in failure reports
    #[arg(long, env = "COIN_NEWS_DEV")]
    pub dev: bool,

    /// Maximum retrieval attempts per URL
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Per-attempt request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "coin_news",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-02",
            "--json-output-dir",
            "./json",
            "https://coinmarketcap.com/currencies/bitcoin/",
            "https://coinmarketcap.com/currencies/ethereum/news/",
        ]);

        assert_eq!(cli.urls.len(), 2);
        assert_eq!(cli.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(cli.end, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(cli.json_output_dir.as_deref(), Some("./json"));
        assert!(cli.export_dir.is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "coin_news",
            "-j",
            "/tmp/json",
            "-x",
            "/tmp/export",
            "-s",
            "2024-03-05",
            "https://coinmarketcap.com/currencies/solana/",
        ]);

        assert_eq!(cli.json_output_dir.as_deref(), Some("/tmp/json"));
        assert_eq!(cli.export_dir.as_deref(), Some("/tmp/export"));
        assert_eq!(cli.start, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert!(cli.end.is_none());
    }

    #[test]
    fn test_value_enums() {
        let cli = Cli::parse_from([
            "coin_news",
            "--route",
            "api",
            "--locale",
            "en",
            "https://coinmarketcap.com/currencies/bitcoin/",
        ]);
        assert_eq!(cli.route, Some(RouteKind::Api));
        assert_eq!(cli.locale, Some(HeaderLocale::En));
    }

    #[test]
    fn test_urls_are_required() {
        assert!(Cli::try_parse_from(["coin_news"]).is_err());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(
            Cli::try_parse_from(["coin_news", "--start", "01/02/2024", "https://x.test/currencies/a/"])
                .is_err()
        );
    }
}
