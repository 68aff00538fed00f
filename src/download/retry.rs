//! Retry logic with linear backoff for segment fetches.
//!
//! Every failed attempt is retried until the attempt budget runs out; there
//! is no transient/permanent classification. The wait after attempt `k`
//! fails is `k * delay_unit` (1s, 2s, 3s, ... with the default unit).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use segment_downloader::download::{RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_millis(1000));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { .. } => unreachable!(),
//! }
//! ```

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::constants::{DEFAULT_MAX_ATTEMPTS, RETRY_DELAY_UNIT};

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry configuration with linear backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `delay_unit`: 1 second
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Multiplied by the failed attempt number to get the wait.
    delay_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_unit: RETRY_DELAY_UNIT,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is raised to 1 if zero.
    #[must_use]
    pub fn new(max_attempts: u32, delay_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_unit,
        }
    }

    /// Creates a policy with a custom `max_attempts`, keeping the default delay unit.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, RETRY_DELAY_UNIT)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the wait that follows a failure of attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.delay_unit.saturating_mul(attempt)
    }

    /// Determines whether to retry after attempt `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay_after(attempt),
            attempt: attempt + 1,
        }
    }
}

/// Suspension seam for backoff waits and the inter-window pause.
///
/// Production code uses [`TokioSleeper`]; tests substitute a recorder so the
/// requested durations can be asserted without waiting them out.
#[async_trait]
pub trait Sleeper: Send + Sync + Debug {
    /// Suspends the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
