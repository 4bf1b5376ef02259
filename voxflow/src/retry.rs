//! Retry with exponential backoff and jitter for transient network calls.
//!
//! Wraps hub reconnects and HTTP calls: any failure retries while attempts
//! remain, with a randomized backoff so a dropped server does not see a
//! synchronized reconnect storm.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::errors::RetryError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the initial one.
    pub max_attempts: usize,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on the computed delay in milliseconds.
    pub max_delay_ms: u64,
    /// Fraction of the delay used as symmetric jitter, in [0, 1].
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter factor.
    #[must_use]
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Base delay before retry number `attempt` (1-based), without jitter.
    ///
    /// `initial * 2^(attempt-1)`, saturating, capped at the maximum.
    #[must_use]
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Base delay with symmetric jitter applied, clamped to non-negative.
    #[must_use]
    pub fn jittered_delay(&self, attempt: usize) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        if base == 0.0 || self.jitter_factor == 0.0 {
            return self.base_delay(attempt);
        }
        let jitter = base * self.jitter_factor * rand::thread_rng().gen_range(-1.0..=1.0);
        Duration::from_millis((base + jitter).max(0.0) as u64)
    }

    /// Runs `operation` until it succeeds, attempts are exhausted, or the
    /// token is cancelled.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + std::fmt::Debug,
    {
        self.run_with_hook(cancel, operation, |_, _| {}).await
    }

    /// [`run`](Self::run) with an `on_retry(attempt, &error)` hook fired
    /// before each backoff wait.
    ///
    /// Any error retries while attempts remain; callers wanting to bail out
    /// early on permanent errors pre-filter with [`RetryableError`].
    /// Exhaustion surfaces the final error; cancellation aborts mid-backoff
    /// and is reported as [`RetryError::Cancelled`], never logged as a
    /// failure.
    pub async fn run_with_hook<T, E, F, Fut, H>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        mut on_retry: H,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + std::fmt::Debug,
        H: FnMut(usize, &E),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled(cancel.reason().unwrap_or_default()));
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= max_attempts {
                        debug!(attempts = attempt, error = %e, "retries exhausted");
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    on_retry(attempt, &e);
                    let delay = self.jittered_delay(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after error"
                    );

                    tokio::select! {
                        () = cancel.cancelled() => {
                            return Err(RetryError::Cancelled(
                                cancel.reason().unwrap_or_default(),
                            ));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }

                    attempt += 1;
                }
            }
        }
    }
}

/// Classification hook for callers that pre-filter permanent failures
/// before entering the retry loop. The loop itself does not consult it.
pub trait RetryableError {
    /// Whether retrying this error can plausibly succeed.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for std::io::Error {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::WouldBlock
        )
    }
}
