//! Retry with exponential backoff and jitter for transient browser failures.
//!
//! [`with_retry`] wraps an async operation. Failures classified as
//! transient by [`AppError::is_retryable`] are retried after
//!
//! ```text
//! d = min(base_delay * 2^attempt, max_delay)
//! sleep = d + uniform(0, d / 2)
//! ```
//!
//! until `max_retries` retries have been spent. Anything else propagates
//! on first occurrence.

use std::time::Duration;

use rand::Rng;

use crate::error::AppError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Backoff bounds for [`with_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Capped exponential delay before jitter for a zero-based `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Inclusive lower and exclusive upper bound of the sleep for `attempt`.
    pub fn sleep_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let d = self.backoff(attempt);
        (d, d + d / 2)
    }

    /// Backoff plus uniform jitter in `[0, backoff / 2)`.
    pub fn sleep_for(&self, attempt: u32) -> Duration {
        let d = self.backoff(attempt);
        let half = d / 2;
        if half.is_zero() {
            return d;
        }
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..half);
        d + jitter
    }
}

/// Runs `operation`, retrying transient failures according to `policy`.
///
/// `label` names the operation in logs.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if attempt >= policy.max_retries {
                    tracing::error!(
                        operation = %label,
                        attempts = attempt + 1,
                        error = %e,
                        "Retries exhausted"
                    );
                    return Err(e);
                }
                let sleep = policy.sleep_for(attempt);
                tracing::warn!(
                    operation = %label,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    sleep_ms = %sleep.as_millis(),
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(sleep).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    operation = %label,
                    category = e.category(),
                    error = %e,
                    "Non-retryable failure"
                );
                return Err(e);
            }
        }
    }
}
