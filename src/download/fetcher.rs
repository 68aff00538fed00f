//! Segment fetcher: one segment, bounded attempts, failure as a value.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::HttpClient;
use super::retry::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};

/// One segment to download.
///
/// `index` is the ordering key for the merged artifact and is fixed when the
/// task list is built; it never depends on fetch completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentTask {
    /// Absolute segment URL.
    pub url: String,
    /// 1-based position in the merged output.
    pub index: u64,
}

impl SegmentTask {
    /// Creates a new task.
    pub fn new(url: impl Into<String>, index: u64) -> Self {
        Self {
            url: url.into(),
            index,
        }
    }
}

/// Fully buffered segment body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSuccess {
    /// Index of the task this body belongs to.
    pub index: u64,
    /// Raw segment bytes.
    pub bytes: Bytes,
}

/// Segment that could not be fetched within the attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    /// Index of the failed task.
    pub index: u64,
    /// Message of the last error observed.
    pub reason: String,
}

/// Outcome of fetching one segment. Produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentResult {
    /// The segment body was received.
    Success(SegmentSuccess),
    /// Every attempt failed.
    Failure(SegmentFailure),
}

impl SegmentResult {
    /// Returns the task index this result belongs to.
    #[must_use]
    pub fn index(&self) -> u64 {
        match self {
            Self::Success(s) => s.index,
            Self::Failure(f) => f.index,
        }
    }

    /// Returns `true` for [`SegmentResult::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Downloads single segments with retry.
///
/// Cheap to clone: the HTTP client and sleeper are shared.
#[derive(Debug, Clone)]
pub struct SegmentFetcher {
    client: HttpClient,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SegmentFetcher {
    /// Creates a fetcher that waits with `tokio::time::sleep`.
    #[must_use]
    pub fn new(client: HttpClient, policy: RetryPolicy) -> Self {
        Self::with_sleeper(client, policy, Arc::new(TokioSleeper))
    }

    /// Creates a fetcher with an explicit sleeper.
    #[must_use]
    pub fn with_sleeper(
        client: HttpClient,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the HTTP client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Returns the sleeper shared with the batch engine.
    #[must_use]
    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    /// Fetches one segment, retrying failed attempts with linear backoff.
    ///
    /// Never returns an error: after the last attempt the failure is reported
    /// as [`SegmentResult::Failure`] carrying the last error message.
    #[instrument(skip(self, task), fields(index = task.index, url = %task.url))]
    pub async fn fetch(&self, task: &SegmentTask) -> SegmentResult {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            info!(attempt, "downloading segment {} (attempt {attempt})", task.index);

            let error = match self.client.get_bytes(&task.url).await {
                Ok(bytes) => {
                    info!(
                        attempt,
                        bytes = bytes.len(),
                        "downloaded segment {}",
                        task.index
                    );
                    return SegmentResult::Success(SegmentSuccess {
                        index: task.index,
                        bytes,
                    });
                }
                Err(e) => e,
            };

            warn!(
                attempt,
                error = %error,
                "failed to download segment {} (attempt {attempt})",
                task.index
            );

            match self.policy.should_retry(attempt) {
                RetryDecision::Retry { delay, .. } => {
                    self.sleeper.sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(%reason, "giving up on segment {}", task.index);
                    return SegmentResult::Failure(SegmentFailure {
                        index: task.index,
                        reason: error.to_string(),
                    });
                }
            }
        }
    }
}
