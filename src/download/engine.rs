//! Batch scheduler: fixed-size windows with a barrier between them.
//!
//! The engine splits an ordered task list into consecutive windows of
//! `concurrency` tasks. All fetches of a window run concurrently; the next
//! window starts only after every fetch of the current one has settled, and
//! after a fixed pause. Progress is published before and after each window.
//!
//! # Example
//!
//! ```no_run
//! use segment_downloader::download::{
//!     DownloadEngine, HttpClient, RetryPolicy, SegmentFetcher, SegmentTask,
//! };
//! use segment_downloader::progress::ProgressStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = SegmentFetcher::new(HttpClient::new(), RetryPolicy::default());
//! let engine = DownloadEngine::new(5, fetcher)?;
//! let store = ProgressStore::new();
//! let tasks = vec![SegmentTask::new("https://cdn.example/seg-1.ts", 1)];
//! let outcome = engine.run(&tasks, &store.session("demo")).await;
//! println!("ok: {}, failed: {}", outcome.successes.len(), outcome.failures.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::constants::{BATCH_PAUSE, MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::fetcher::{
    SegmentFailure, SegmentFetcher, SegmentResult, SegmentSuccess, SegmentTask,
};
use super::retry::Sleeper;
use crate::progress::{ProgressKind, ProgressRecord, SessionProgress};

/// Error type for download engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error("Concurrency must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Results of a batch run, in window order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Segments that were fetched.
    pub successes: Vec<SegmentSuccess>,
    /// Segments that failed every attempt.
    pub failures: Vec<SegmentFailure>,
}

impl BatchOutcome {
    /// Indices of failed segments, ascending.
    #[must_use]
    pub fn failed_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.failures.iter().map(|f| f.index).collect();
        indices.sort_unstable();
        indices
    }

    /// Total number of settled tasks.
    #[must_use]
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Windowed segment downloader.
///
/// # Concurrency Model
///
/// - Within a window every fetch runs concurrently on the calling task
/// - Windows never overlap: the next starts once all fetches have settled
/// - A pause separates consecutive windows (none after the last)
/// - Completion order inside a window only affects progress counters
#[derive(Debug)]
pub struct DownloadEngine {
    concurrency: usize,
    fetcher: SegmentFetcher,
    batch_pause: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl DownloadEngine {
    /// Creates a new engine with the given window size.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if `concurrency` is
    /// outside `1..=20`.
    #[instrument(level = "debug", skip(fetcher))]
    pub fn new(concurrency: usize, fetcher: SegmentFetcher) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = fetcher.retry_policy().max_attempts(),
            "creating download engine"
        );

        let sleeper = fetcher.sleeper();
        Ok(Self {
            concurrency,
            fetcher,
            batch_pause: BATCH_PAUSE,
            sleeper,
        })
    }

    /// Overrides the pause between windows.
    #[must_use]
    pub fn with_batch_pause(mut self, batch_pause: Duration) -> Self {
        self.batch_pause = batch_pause;
        self
    }

    /// Returns the configured window size.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every task window by window.
    ///
    /// Individual segment failures never abort the run; they are collected
    /// in [`BatchOutcome::failures`].
    #[instrument(skip(self, tasks, progress), fields(tasks = tasks.len(), concurrency = self.concurrency, session_id = %progress.session_id()))]
    pub async fn run(&self, tasks: &[SegmentTask], progress: &SessionProgress) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let total = tasks.len() as u64;
        let total_windows = window_count(tasks.len(), self.concurrency);

        info!(total_windows, "starting batch run");

        for (position, window) in tasks.chunks(self.concurrency).enumerate() {
            let window_number = position + 1;
            let (first, last) = window_bounds(window);

            info!(window = window_number, total_windows, first, last, "downloading window");
            progress.publish(
                ProgressRecord::new(
                    ProgressKind::Downloading,
                    format!("Downloading batch {window_number}/{total_windows}..."),
                )
                .with_counts(outcome.successes.len() as u64, total)
                .with_batch(window_number, total_windows),
            );

            let results = join_all(window.iter().map(|task| self.fetcher.fetch(task))).await;
            for result in results {
                match result {
                    SegmentResult::Success(success) => outcome.successes.push(success),
                    SegmentResult::Failure(failure) => outcome.failures.push(failure),
                }
            }

            progress.publish(
                ProgressRecord::new(
                    ProgressKind::Downloading,
                    format!("Completed batch {window_number}/{total_windows}"),
                )
                .with_counts(outcome.successes.len() as u64, total)
                .with_batch(window_number, total_windows),
            );

            if window_number < total_windows {
                self.sleeper.sleep(self.batch_pause).await;
            }
        }

        if !outcome.failures.is_empty() {
            warn!(
                failed = outcome.failures.len(),
                indices = ?outcome.failed_indices(),
                "some segments failed to download"
            );
        }
        info!(
            succeeded = outcome.successes.len(),
            failed = outcome.failures.len(),
            "batch run complete"
        );

        outcome
    }
}

/// Number of windows needed for `tasks` items: `ceil(tasks / concurrency)`.
#[must_use]
pub fn window_count(tasks: usize, concurrency: usize) -> usize {
    if concurrency == 0 {
        return 0;
    }
    tasks.div_ceil(concurrency)
}

fn window_bounds(window: &[SegmentTask]) -> (u64, u64) {
    let first = window.first().map_or(0, |t| t.index);
    let last = window.last().map_or(0, |t| t.index);
    (first, last)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::{HttpClient, RetryPolicy};
    use crate::progress::ProgressStore;
    use crate::test_support::RecordingSleeper;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(sleeper: Arc<RecordingSleeper>) -> SegmentFetcher {
        SegmentFetcher::with_sleeper(HttpClient::new(), RetryPolicy::with_max_attempts(2), sleeper)
    }

    async fn mount_segment(server: &MockServer, index: u64, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/seg-{index}.ts")))
            .respond_with(
                ResponseTemplate::new(status).set_body_bytes(format!("[{index}]").into_bytes()),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_engine_new_valid_concurrency_bounds() {
        let sleeper = Arc::new(RecordingSleeper::default());
        for value in [1, 5, 20] {
            let engine = DownloadEngine::new(value, fetcher(Arc::clone(&sleeper))).unwrap();
            assert_eq!(engine.concurrency(), value);
        }
    }

    #[test]
    fn test_engine_new_rejects_zero_and_twenty_one() {
        let sleeper = Arc::new(RecordingSleeper::default());
        for value in [0, 21] {
            let result = DownloadEngine::new(value, fetcher(Arc::clone(&sleeper)));
            assert!(matches!(
                result,
                Err(EngineError::InvalidConcurrency { value: v }) if v == value
            ));
        }
    }

    #[test]
    fn test_engine_error_display() {
        let msg = EngineError::InvalidConcurrency { value: 0 }.to_string();
        assert_eq!(msg, "Concurrency must be between 1 and 20");
    }

    #[test]
    fn test_window_count_is_ceiling_division() {
        for concurrency in 1..=20usize {
            for tasks in 0..=45usize {
                let windows = window_count(tasks, concurrency);
                assert_eq!(windows, tasks.div_ceil(concurrency));

                let items: Vec<usize> = (0..tasks).collect();
                let chunks: Vec<&[usize]> = items.chunks(concurrency).collect();
                assert_eq!(chunks.len(), windows);
                if let Some((last, full)) = chunks.split_last() {
                    assert!(full.iter().all(|w| w.len() == concurrency));
                    assert!(!last.is_empty() && last.len() <= concurrency);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_run_collects_successes_and_failures_with_pauses_between_windows() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        for index in 1..=5 {
            mount_segment(&server, index, if index == 4 { 500 } else { 200 }).await;
        }

        let sleeper = Arc::new(RecordingSleeper::default());
        let engine = DownloadEngine::new(2, fetcher(Arc::clone(&sleeper))).unwrap();
        let store = ProgressStore::new();
        let session = store.session("run-1");
        let tasks: Vec<SegmentTask> = (1..=5)
            .map(|i| SegmentTask::new(format!("{}/seg-{i}.ts", server.uri()), i))
            .collect();

        let outcome = engine.run(&tasks, &session).await;

        assert_eq!(outcome.successes.len(), 4);
        assert_eq!(outcome.failed_indices(), vec![4]);
        assert_eq!(outcome.total(), 5);

        // 3 windows -> 2 inter-window pauses, plus one 1s backoff for index 4.
        let recorded = sleeper.recorded();
        assert_eq!(recorded.len(), 3);
        assert!(recorded.iter().all(|d| *d == Duration::from_secs(1)));

        let last = store.snapshot("run-1").unwrap();
        assert_eq!(last.kind, ProgressKind::Downloading);
        assert_eq!(last.message, "Completed batch 3/3");
        assert_eq!(last.completed, Some(4));
        assert_eq!(last.total, Some(5));
        assert_eq!(last.percentage, Some(80));
        assert_eq!(last.current_batch, Some(3));
        assert_eq!(last.total_batches, Some(3));
    }

    #[tokio::test]
    async fn test_run_single_window_has_no_pause() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        for index in 1..=3 {
            mount_segment(&server, index, 200).await;
        }

        let sleeper = Arc::new(RecordingSleeper::default());
        let engine = DownloadEngine::new(5, fetcher(Arc::clone(&sleeper)))
            .unwrap()
            .with_batch_pause(Duration::from_millis(1234));
        let store = ProgressStore::new();
        let tasks: Vec<SegmentTask> = (1..=3)
            .map(|i| SegmentTask::new(format!("{}/seg-{i}.ts", server.uri()), i))
            .collect();

        let outcome = engine.run(&tasks, &store.session("s")).await;

        assert_eq!(outcome.successes.len(), 3);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_run_empty_task_list_publishes_nothing() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let engine = DownloadEngine::new(3, fetcher(sleeper)).unwrap();
        let store = ProgressStore::new();

        let outcome = engine.run(&[], &store.session("empty")).await;

        assert_eq!(outcome.total(), 0);
        assert!(store.snapshot("empty").is_none());
    }
}
