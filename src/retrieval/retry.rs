//! Bounded retry with exponential backoff around a [`Retrieve`].
//!
//! # Retry Strategy
//!
//! - At most `max_attempts` attempts (3 by default)
//! - After failed attempt `n` the delay is `base_delay * 2^n`, so with the
//!   default 1 second base: 2s, then 4s
//! - Optional random jitter (0..=`max_jitter`) added to each delay
//! - Only transient failures are retried; see [`FailureKind::is_transient`]
//! - An optional deadline bounds the whole retrieval, backoff sleeps included
//!
//! [`FailureKind::is_transient`]: crate::error::FailureKind::is_transient

use super::{RetrievalResult, Retrieve};
use crate::error::FailureKind;
use crate::target::CoinPage;
use rand::{Rng, rng};
use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Something that can wait. Injected so tests can observe backoff without
/// actually sleeping.
pub trait Sleep {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping via the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Final result of a retried retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub result: RetrievalResult,
    /// Attempts started, including the one that produced `result`.
    pub attempts: u32,
}

/// Wrapper that adds exponential backoff retry logic to any [`Retrieve`].
pub struct RetryRetrieve<T, S = TokioSleep> {
    inner: T,
    sleeper: S,
    max_attempts: u32,
    base_delay: Duration,
    max_jitter: Duration,
    deadline: Option<Duration>,
}

impl<T: Retrieve> RetryRetrieve<T, TokioSleep> {
    /// Wrap `inner` with the default policy: 3 attempts, 1 second base delay,
    /// no jitter, no deadline.
    pub fn new(inner: T) -> Self {
        Self::with_sleeper(inner, TokioSleep)
    }
}

impl<T: Retrieve, S: Sleep> RetryRetrieve<T, S> {
    pub fn with_sleeper(inner: T, sleeper: S) -> Self {
        Self {
            inner,
            sleeper,
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::ZERO,
            deadline: None,
        }
    }

    /// Total attempts, clamped to at least one.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Bound the whole retrieval. Expiry cancels the in-flight attempt or
    /// backoff sleep and yields a [`FailureKind::Timeout`] failure.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &T {
        &self.inner
    }

    /// Backoff before the attempt following failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            delay
        } else {
            delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
        }
    }

    #[instrument(level = "info", skip_all, fields(slug = %page.slug()))]
    pub async fn retrieve(&self, page: &CoinPage) -> Retrieved {
        let attempts = Cell::new(0);
        let attempt_loop = self.attempt_loop(page, &attempts);
        let result = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, attempt_loop).await {
                Ok(result) => result,
                Err(_) => {
                    error!(?deadline, attempts = attempts.get(), "Retrieval deadline exceeded");
                    RetrievalResult::failure(
                        FailureKind::Timeout,
                        format!("retrieval deadline of {deadline:?} exceeded"),
                    )
                }
            },
            None => attempt_loop.await,
        };
        Retrieved {
            result,
            attempts: attempts.get(),
        }
    }

    async fn attempt_loop(&self, page: &CoinPage, attempts: &Cell<u32>) -> RetrievalResult {
        let total_t0 = Instant::now();

        loop {
            let attempt = attempts.get() + 1;
            attempts.set(attempt);

            let attempt_t0 = Instant::now();
            let result = self.inner.retrieve(page).await;
            let RetrievalResult::Failure { kind, message } = &result else {
                return result;
            };

            let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
            let elapsed_ms_total = total_t0.elapsed().as_millis();

            if !kind.is_transient() {
                warn!(attempt, %kind, error = %message, "Non-transient failure; not retrying");
                return result;
            }

            if attempt >= self.max_attempts {
                error!(
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_attempt,
                    elapsed_ms_total,
                    %kind,
                    error = %message,
                    "Retrieval exhausted retries"
                );
                return result;
            }

            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max = self.max_attempts,
                elapsed_ms_attempt,
                elapsed_ms_total,
                ?delay,
                %kind,
                error = %message,
                "Retrieval attempt failed; backing off"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

impl<T, S> fmt::Debug for RetryRetrieve<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryRetrieve")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_jitter", &self.max_jitter)
            .field("deadline", &self.deadline)
            .finish()
    }
}
