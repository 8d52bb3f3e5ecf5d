//! Failure taxonomy for a pipeline run.
//!
//! Retrieval failures are classified by [`FailureKind`]; only transient kinds
//! are retried. Anything that reaches the caller is a [`PipelineError`], which
//! can be rendered into a user-facing [`FailureReport`]. Diagnostic detail is
//! attached to the report only in development mode.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Classification of a failed retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream answered with a non-success status code.
    HttpStatus(u16),
    /// Upstream answered 2xx with nothing in the body.
    EmptyBody,
    /// The attempt (or the whole retrieval) ran out of time.
    Timeout,
    /// Connection, DNS or body-read failure.
    Network,
    /// The payload arrived but does not have the expected shape.
    MalformedUpstream,
}

impl FailureKind {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Only request timeouts, rate limiting and server-side statuses count;
    /// other 4xx responses will not change on retry.
    pub fn is_transient(self) -> bool {
        match self {
            Self::Timeout | Self::Network => true,
            Self::HttpStatus(code) => matches!(code, 408 | 425 | 429) || (500..=599).contains(&code),
            Self::EmptyBody | Self::MalformedUpstream => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(code) => write!(f, "HTTP status {code}"),
            Self::EmptyBody => f.write_str("empty body"),
            Self::Timeout => f.write_str("timeout"),
            Self::Network => f.write_str("network error"),
            Self::MalformedUpstream => f.write_str("malformed upstream payload"),
        }
    }
}

/// Terminal failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The URL was empty, unparseable, or had no `currencies/<slug>` segment.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Retrieval gave up, either after exhausting retries or on a failure
    /// that retrying cannot fix.
    #[error("retrieval failed after {attempts} attempt(s) ({kind}): {message}")]
    RetrievalFailed {
        kind: FailureKind,
        attempts: u32,
        message: String,
    },

    /// The payload was retrieved but violates the expected contract.
    #[error("malformed upstream response: {0}")]
    MalformedUpstream(String),

    /// No container pattern matched; the page shape is not recognized.
    #[error("no news section found (tried {patterns_tried} container patterns)")]
    NoNewsSection { patterns_tried: usize },
}

impl PipelineError {
    /// Stable machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::RetrievalFailed { .. } => "retrieval_failed",
            Self::MalformedUpstream(_) => "malformed_upstream",
            Self::NoNewsSection { .. } => "no_news_section",
        }
    }

    /// Short message suitable for end users.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "Please enter a valid CoinMarketCap currency page URL.",
            Self::RetrievalFailed { .. } => {
                "Fetching news failed. Check the URL and your network connection."
            }
            Self::MalformedUpstream(_) => "The news service returned data in an unexpected format.",
            Self::NoNewsSection { .. } => "No news section was found on the page.",
        }
    }

    /// Render the failure for users. `development` controls whether the
    /// original error text, URL and timestamp are attached.
    pub fn to_report(&self, url: &str, development: bool) -> FailureReport {
        FailureReport {
            kind: self.kind(),
            message: self.user_message().to_string(),
            diagnostics: development.then(|| Diagnostics {
                error: self.to_string(),
                url: url.to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
        }
    }
}

/// User-facing rendering of a [`PipelineError`].
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Development-only detail attached to a [`FailureReport`].
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub error: String,
    pub url: String,
    pub timestamp: String,
}
