//! Bounded retry with exponential backoff.
//!
//! The delay schedule comes from `backoff::ExponentialBackoff` without
//! jitter; attempt counting and the per-attempt timeout live here.

use crate::errors::LedgerError;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use driftlog_core::errors::{AuditError, AuditErrorKind};
use std::future::Future;
use std::time::Duration;

/// Retry schedule for one ledger call.
///
/// Attempt `n` (1-based) that fails transiently is followed by a sleep of
/// `initial_backoff * multiplier^(n-1)`, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
    /// Applied to each attempt separately
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A call that eventually succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
    /// Failed attempts before the success; non-zero means a write may
    /// have landed more than once.
    pub transient_failures: u32,
}

/// A call that failed for good: retries used up, or a non-retryable error.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted {
    pub error: LedgerError,
    pub attempts: u32,
}

impl From<Exhausted> for AuditError {
    fn from(exhausted: Exhausted) -> Self {
        AuditError::new(AuditErrorKind::CommitFailure)
            .with_attempts(exhausted.attempts)
            .with_message(format!(
                "ledger call failed after {} attempt(s)",
                exhausted.attempts
            ))
            .with_source(AuditError::from(exhausted.error))
    }
}

impl RetryPolicy {
    /// Fresh delay schedule for one call.
    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_multiplier(f64::from(self.multiplier.max(1)))
            .with_randomization_factor(0.0)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Sleep before attempt `attempt + 1`, after attempt `attempt` failed.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let mut schedule = self.schedule();
        let mut delay = self.initial_backoff.min(self.max_backoff);
        for _ in 0..attempt.max(1) {
            delay = schedule.next_backoff().unwrap_or(self.max_backoff);
        }
        delay
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` is reached. `call` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`Exhausted`] with the last error and the number of attempts made.
    pub async fn execute<T, F, Fut>(&self, op: &str, mut call: F) -> Result<Attempted<T>, Exhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut schedule = self.schedule();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.request_timeout, call(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(LedgerError::Timeout {
                    timeout_ms: self.request_timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                        transient_failures: attempt - 1,
                    })
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let backoff = schedule.next_backoff().unwrap_or(self.max_backoff);
                    tracing::warn!(
                        op,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %error,
                        "ledger call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => {
                    return Err(Exhausted {
                        error,
                        attempts: attempt,
                    })
                }
            }
        }
    }
}
