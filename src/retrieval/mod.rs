//! Fetching the raw listing payload for a coin page.
//!
//! This module separates a single network attempt from the policy around it:
//!
//! - [`Retrieve`]: one logical attempt, classified into a [`RetrievalResult`]
//! - [`client::HttpRetriever`]: the reqwest-backed implementation, with three
//!   routes (direct page, proxy endpoint, upstream JSON API)
//! - [`retry::RetryRetrieve`]: bounded retries with exponential backoff over
//!   any [`Retrieve`], sleeping through an injected [`retry::Sleep`]
//! - [`render`]: turns the upstream JSON API response into listing markup

pub mod client;
pub mod render;
pub mod retry;

use crate::error::FailureKind;
use crate::target::CoinPage;

pub use client::{HttpRetriever, Route};
pub use retry::{RetryRetrieve, Sleep, TokioSleep};

/// Outcome of one retrieval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalResult {
    /// Markup ready for extraction.
    Success { payload: String },
    Failure { kind: FailureKind, message: String },
}

impl RetrievalResult {
    pub fn success(payload: impl Into<String>) -> Self {
        Self::Success {
            payload: payload.into(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }
}

/// A single logical retrieval attempt for a coin page.
///
/// Implementations never retry on their own; that is [`RetryRetrieve`]'s job.
pub trait Retrieve {
    async fn retrieve(&self, page: &CoinPage) -> RetrievalResult;
}
