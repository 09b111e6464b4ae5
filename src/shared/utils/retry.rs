//! Bounded exponential backoff for pipeline stages
//!
//! The retry decision lives here and in the worker only: clients and the
//! engine adapter surface errors (and any server retry hint) without retrying.

use crate::shared::errors::AppError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for stage retry behavior
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per stage, first try included
    pub max_attempts: u32,
    /// Base delay between attempts
    pub base_delay: Duration,
    /// Upper bound for computed delays and server hints
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add up to 10% random jitter
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with no waiting between attempts (tests, dev mode)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Calculate delay before retry number `attempt` (0 = first retry)
    pub fn calculate_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        // If server provided Retry-After header, respect it
        if let Some(server_delay) = retry_after {
            return server_delay.min(self.max_delay);
        }

        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let mut delay = Duration::from_millis((self.base_delay.as_millis() as f64 * multiplier) as u64)
            .min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let jitter_ms = (delay.as_millis() as f64 * 0.1 * rand::random::<f64>()) as u64;
            delay += Duration::from_millis(jitter_ms);
        }

        delay
    }
}

/// Error returned once a stage gives up
#[derive(Debug, Clone)]
pub struct RetryFailure {
    pub error: AppError,
    pub attempts: u32,
}

impl RetryFailure {
    /// Human-readable detail suitable for persisting on a failed job
    pub fn detail(&self) -> String {
        if self.error.is_transient() {
            format!(
                "[{}] {} (gave up after {} attempt{})",
                self.error.kind(),
                self.error,
                self.attempts,
                if self.attempts == 1 { "" } else { "s" }
            )
        } else {
            format!("[{}] {}", self.error.kind(), self.error)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, AppError::Cancelled(_))
    }
}

pub struct RetryUtil;

impl RetryUtil {
    /// Run `operation` until it succeeds, fails permanently, exhausts the
    /// policy, or `cancel` fires. Waiting and the operation itself are both
    /// interrupted by cancellation.
    pub async fn with_retry<F, Fut, T>(
        mut operation: F,
        policy: &RetryPolicy,
        operation_name: &str,
        cancel: &CancellationToken,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AppError::Cancelled(format!("{} interrupted by shutdown", operation_name))),
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if matches!(error, AppError::Cancelled(_)) || !error.is_transient() {
                debug!("{} failed with non-retryable error: {}", operation_name, error);
                return Err(RetryFailure { error, attempts: attempt });
            }

            if attempt >= max_attempts {
                warn!(
                    "{} failed on final attempt {}/{} ({}), giving up",
                    operation_name, attempt, max_attempts, error
                );
                return Err(RetryFailure { error, attempts: attempt });
            }

            let delay = policy.calculate_delay(attempt - 1, error.retry_after());
            warn!(
                "{} failed on attempt {}/{} ({}), retrying in {:?}",
                operation_name, attempt, max_attempts, error, delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryFailure {
                        error: AppError::Cancelled(format!("{} interrupted by shutdown", operation_name)),
                        attempts: attempt,
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
