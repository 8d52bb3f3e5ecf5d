//! Runtime configuration.
//!
//! Settings come from an optional YAML file and are then overridden by CLI
//! flags and environment variables (see [`crate::cli::Cli`]). Every key has a
//! default, so an empty or missing file is a valid configuration.
//!
//! ```yaml
//! route: proxy
//! proxy_endpoint: http://localhost:3000/api/proxy
//! timeout_secs: 20
//! max_attempts: 3
//! base_delay_secs: 1
//! jitter_ms: 250
//! deadline_secs: 60
//! unknown_source: Unknown
//! development: false
//! export_locale: zh
//! ```

use crate::cli::Cli;
use crate::extract::item::UNKNOWN_SOURCE;
use crate::outputs::spreadsheet::HeaderLocale;
use crate::retrieval::Route;
use crate::retrieval::client::DEFAULT_USER_AGENT;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use url::Url;

/// Which [`Route`] retrieval uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Direct,
    Proxy,
    Api,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub route: RouteKind,
    pub proxy_endpoint: String,
    pub api_endpoint: String,
    /// Per-attempt request timeout.
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub jitter_ms: u64,
    /// Bound on a whole retrieval, backoff included. Unbounded when absent.
    pub deadline_secs: Option<u64>,
    pub user_agent: String,
    pub unknown_source: String,
    /// Attach diagnostics to failure reports.
    pub development: bool,
    pub export_locale: HeaderLocale,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            route: RouteKind::Proxy,
            proxy_endpoint: "http://localhost:3000/api/proxy".to_string(),
            api_endpoint: "https://api.coinmarketcap.com/content/v3/news".to_string(),
            timeout_secs: 20,
            max_attempts: 3,
            base_delay_secs: 1,
            jitter_ms: 250,
            deadline_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            unknown_source: UNKNOWN_SOURCE.to_string(),
            development: false,
            export_locale: HeaderLocale::Zh,
        }
    }
}

impl AppConfig {
    /// Load the YAML file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("reading config file {path}: {e}"))?;
        Self::from_yaml(&text).map_err(|e| format!("parsing config file {path}: {e}").into())
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Apply CLI flags on top of the file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(route) = cli.route {
            self.route = route;
        }
        if let Some(endpoint) = &cli.proxy_endpoint {
            self.proxy_endpoint = endpoint.clone();
        }
        if let Some(attempts) = cli.attempts {
            self.max_attempts = attempts;
        }
        if let Some(timeout) = cli.timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(locale) = cli.locale {
            self.export_locale = locale;
        }
        if cli.dev {
            self.development = true;
        }
    }

    pub fn build_route(&self) -> Result<Route, url::ParseError> {
        Ok(match self.route {
            RouteKind::Direct => Route::Direct,
            RouteKind::Proxy => Route::Proxy {
                endpoint: Url::parse(&self.proxy_endpoint)?,
            },
            RouteKind::Api => Route::Api {
                endpoint: Url::parse(&self.api_endpoint)?,
            },
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
