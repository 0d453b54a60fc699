//! Bounded retry with linear backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::DbError;
use crate::metrics::RetryMetrics;

/// Linear backoff: the n-th delay is `n × interval`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    interval: Duration,
    attempt: u32,
}

impl LinearBackoff {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            attempt: 0,
        }
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        self.interval.saturating_mul(self.attempt)
    }

    /// Reset the backoff to initial state
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Get the current attempt number
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// How many times an operation is invoked and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Total invocations allowed; at least one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// Cancelling `cancel` aborts a pending backoff sleep with
    /// [`DbError::Canceled`]; an in-flight attempt is left to finish.
    pub async fn execute<T, E, F, Fut>(&self, mut op: F, cancel: &CancellationToken) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<DbError>,
    {
        let max_attempts = self.max_attempts();
        let mut backoff = LinearBackoff::new(self.interval);
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(DbError::Canceled);
            }

            attempt += 1;
            let err: DbError = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e.into(),
            };

            match err {
                DbError::Closed
                | DbError::Canceled
                | DbError::NonRetryable { .. }
                | DbError::RetryExhausted { .. }
                | DbError::TransactionPanicked(_) => return Err(err),
                _ if !err.is_retryable() => {
                    RetryMetrics::record_non_retryable();
                    tracing::debug!(
                        attempt = attempt,
                        error = %err,
                        "Database operation failed with non-retryable error"
                    );
                    return Err(DbError::NonRetryable {
                        source: Box::new(err),
                    });
                }
                _ => {}
            }

            if attempt >= max_attempts {
                RetryMetrics::record_exhausted();
                tracing::warn!(
                    attempts = attempt,
                    error = %err,
                    "Database operation failed, retries exhausted"
                );
                return Err(DbError::RetryExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = backoff.next_delay();
            RetryMetrics::record_attempt();
            tracing::warn!(
                attempt = attempt,
                max_attempts = max_attempts,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "Database operation failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DbError::Canceled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
