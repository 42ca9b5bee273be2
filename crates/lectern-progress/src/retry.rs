//! Retry with exponential backoff for quota errors.
//!
//! Only resource-exhaustion errors are retried. Everything else is a
//! permanent failure from the caller's point of view and is returned on the
//! first attempt.
//!
//! # Example
//!
//! ```rust,ignore
//! let policy = RetryPolicy::default();
//! let doc = policy.run(|| store.get(&path)).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::classify::Classify;
use crate::metrics::ProgressMetrics;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Backoff parameters. The delay doubles after every retry, uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_INITIAL_DELAY)
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Total number of times an always-failing operation is invoked.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay slept before retry `retry` (1-based): `initial_delay * 2^(retry - 1)`.
    ///
    /// Returns zero for `retry == 0`, which is the initial attempt.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(retry - 1).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }

    /// Runs `op`, retrying quota errors with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns the operation's error unchanged when it is not a quota error,
    /// or the last quota error once all retries are used.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify,
    {
        let metrics = ProgressMetrics::new();
        let mut delay = self.initial_delay;
        let mut retries = 0;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_quota_exceeded() {
                return Err(err);
            }
            if retries >= self.max_retries {
                warn!(
                    attempts = retries + 1,
                    "quota still exceeded after final retry, giving up"
                );
                return Err(err);
            }

            retries += 1;
            warn!(
                retry = retries,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "quota exceeded, retrying after backoff"
            );
            metrics.record_retry();
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2);
        }
    }
}

/// Runs `op` under the default policy (3 retries, 1s initial delay).
///
/// # Errors
///
/// See [`RetryPolicy::run`].
pub async fn retry_with_backoff<T, E, F, Fut>(op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify,
{
    RetryPolicy::default().run(op).await
}
