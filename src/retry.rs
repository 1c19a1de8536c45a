//! Bounded retry with a fixed delay between attempts
//!
//! Every ledger call, metadata upload, launch API call and store write goes
//! through [`retry_with_fixed_backoff`] (or [`retry_until`] when some errors
//! must not be retried). The delay is constant: attempt `n + 1` starts
//! `policy.delay` after attempt `n` failed. After the last attempt the error
//! of that attempt is returned unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default number of attempts, including the first one
pub const MAX_RETRIES: u32 = 3;

/// Default delay between attempts
pub const RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Fixed-delay retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including initial attempt)
    pub max_attempts: u32,
    /// Delay slept between two attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Single attempt, no sleeping
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Retry `operation` according to `policy`, treating every error as transient
pub async fn retry_with_fixed_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_until(operation_name, policy, |_: &E| false, operation).await
}

/// Retry `operation` according to `policy`, stopping early on errors for
/// which `is_terminal` returns true
pub async fn retry_until<F, Fut, T, E, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_terminal: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        if attempt > 1 {
            debug!(
                operation = operation_name,
                attempt,
                max_attempts,
                "Retrying operation"
            );
        }

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if is_terminal(&err) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Permanent error, not retrying"
                );
                return Err(err);
            }
            Err(err) if attempt >= max_attempts => {
                warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %err,
                    "All retry attempts exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, sleeping before retry"
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
