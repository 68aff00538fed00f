//! Download jobs: one request, one progress session, at most one artifact.
//!
//! A [`JobRunner`] drives the whole pipeline for a request: it builds the
//! task list (template expansion or manifest resolution), runs the windowed
//! download, merges the successes and publishes the session's progress
//! lifecycle `starting -> downloading -> merging -> completed | error`.
//!
//! Any run-level failure is published as a terminal `error` record carrying
//! the same message that is returned to the caller.

mod error;
mod request;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

pub use error::JobError;
pub use request::{
    DEFAULT_MAX_SEGMENTS, DEFAULT_TEMPLATE_END, DEFAULT_TEMPLATE_START, ManifestRequest,
    TemplateRequest, ValidationError, session_id_from,
};

use crate::download::constants::BATCH_PAUSE;
use crate::download::{
    DownloadEngine, HttpClient, RetryPolicy, SegmentFetcher, SegmentTask, Sleeper, TokioSleeper,
};
use crate::merge::{ArtifactKind, ArtifactLabel, MergeWriter, MergedArtifact};
use crate::playlist::{PlaylistResolver, expand_template, select_range};
use crate::progress::{ProgressKind, ProgressRecord, ProgressStore, SessionProgress};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Session the run published to.
    pub session_id: String,
    /// Merged output file.
    pub artifact: MergedArtifact,
    /// Number of segments the run attempted.
    pub requested: u64,
    /// Segment count of the whole manifest (manifest runs only).
    pub playlist_total: Option<u64>,
    /// Number of segments that made it into the artifact.
    pub successful: u64,
    /// Indices that failed every attempt, ascending.
    pub failed_indices: Vec<u64>,
}

/// Executes download jobs against shared HTTP, progress and output resources.
///
/// Cheap to clone; clones share the HTTP connection pool and progress table.
#[derive(Debug, Clone)]
pub struct JobRunner {
    client: HttpClient,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    batch_pause: Duration,
    max_segments: u64,
    merger: MergeWriter,
    progress: ProgressStore,
}

impl JobRunner {
    /// Creates a runner with real sleeps and the default 1s window pause.
    #[must_use]
    pub fn new(
        client: HttpClient,
        policy: RetryPolicy,
        merger: MergeWriter,
        progress: ProgressStore,
    ) -> Self {
        Self {
            client,
            policy,
            sleeper: Arc::new(TokioSleeper),
            batch_pause: BATCH_PAUSE,
            max_segments: DEFAULT_MAX_SEGMENTS,
            merger,
            progress,
        }
    }

    /// Replaces the sleeper used for backoff and window pauses.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Overrides the pause between windows.
    #[must_use]
    pub fn with_batch_pause(mut self, batch_pause: Duration) -> Self {
        self.batch_pause = batch_pause;
        self
    }

    /// Caps the number of segments a template run may cover.
    #[must_use]
    pub fn with_max_segments(mut self, max_segments: u64) -> Self {
        self.max_segments = max_segments;
        self
    }

    /// Progress table this runner publishes into.
    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Artifact writer.
    #[must_use]
    pub fn merger(&self) -> &MergeWriter {
        &self.merger
    }

    /// Publishes a terminal `error` record for a request rejected before it ran.
    pub fn reject(&self, session_id: &str, err: &JobError) {
        publish_failure(&self.progress.session(session_id), err);
    }

    /// Downloads `start..=end` of a URL template and merges the result.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Validation`] when the range is inverted or longer
    /// than the configured maximum, [`JobError::AllSegmentsFailed`] when
    /// nothing was fetched and
    /// [`JobError::Merge`] when the artifact cannot be written. The error is
    /// also published to the session.
    #[instrument(skip(self, request), fields(session_id = %session_id, start = request.start, end = request.end, concurrency = request.concurrency))]
    pub async fn run_template(
        &self,
        session_id: &str,
        request: TemplateRequest,
    ) -> Result<JobReport, JobError> {
        let session = self.progress.session(session_id);
        let result = self.template_job(&session, request).await;
        if let Err(err) = &result {
            publish_failure(&session, err);
        }
        result
    }

    /// Resolves a manifest, downloads the requested sub-range and merges it.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Playlist`] if the manifest cannot be fetched or
    /// the sub-range starts past its end, [`JobError::EmptyPlaylist`] if it
    /// lists no segments, and otherwise the same errors as
    /// [`JobRunner::run_template`]. The error is also published.
    #[instrument(skip(self, request), fields(session_id = %session_id, manifest_url = %request.manifest_url, concurrency = request.concurrency))]
    pub async fn run_manifest(
        &self,
        session_id: &str,
        request: ManifestRequest,
    ) -> Result<JobReport, JobError> {
        let session = self.progress.session(session_id);
        let result = self.manifest_job(&session, request).await;
        if let Err(err) = &result {
            publish_failure(&session, err);
        }
        result
    }

    async fn template_job(
        &self,
        session: &SessionProgress,
        request: TemplateRequest,
    ) -> Result<JobReport, JobError> {
        request.check_bounds(self.max_segments)?;
        let count = request.segment_count();
        info!(segments = count, "starting template download");
        session.publish(
            ProgressRecord::new(
                ProgressKind::Starting,
                format!("Preparing to download {count} segments..."),
            )
            .with_total_segments(count),
        );

        let tasks = expand_template(&request.base_url, request.start, request.end);
        let label = ArtifactLabel::new(ArtifactKind::Template, request.start, request.end);
        self.download_and_merge(session, &tasks, request.concurrency, label, None)
            .await
    }

    async fn manifest_job(
        &self,
        session: &SessionProgress,
        request: ManifestRequest,
    ) -> Result<JobReport, JobError> {
        session.publish(ProgressRecord::new(
            ProgressKind::Starting,
            "Parsing M3U8 playlist...",
        ));

        let resolver = PlaylistResolver::new(self.client.clone());
        let all = resolver.resolve(&request.manifest_url).await?;
        if all.is_empty() {
            return Err(JobError::EmptyPlaylist);
        }
        let playlist_total = all.len() as u64;

        let tasks = select_range(all, request.start, request.end)?;
        let (Some(first), Some(last)) = (tasks.first(), tasks.last()) else {
            return Err(JobError::EmptyPlaylist);
        };
        info!(
            playlist_total,
            first = first.index,
            last = last.index,
            "starting manifest download"
        );

        let label = ArtifactLabel::new(ArtifactKind::Manifest, first.index, last.index);
        self.download_and_merge(session, &tasks, request.concurrency, label, Some(playlist_total))
            .await
    }

    async fn download_and_merge(
        &self,
        session: &SessionProgress,
        tasks: &[SegmentTask],
        concurrency: usize,
        label: ArtifactLabel,
        playlist_total: Option<u64>,
    ) -> Result<JobReport, JobError> {
        let fetcher = SegmentFetcher::with_sleeper(
            self.client.clone(),
            self.policy.clone(),
            Arc::clone(&self.sleeper),
        );
        let engine =
            DownloadEngine::new(concurrency, fetcher)?.with_batch_pause(self.batch_pause);

        let total = tasks.len() as u64;
        let opening = match label.kind {
            ArtifactKind::Template => "Starting download...".to_string(),
            ArtifactKind::Manifest => format!("Starting download of {total} segments..."),
        };
        session.publish(
            ProgressRecord::new(ProgressKind::Downloading, opening).with_counts(0, total),
        );

        let outcome = engine.run(tasks, session).await;
        if outcome.successes.is_empty() {
            return Err(JobError::AllSegmentsFailed);
        }

        let successful = outcome.successes.len() as u64;
        let failed_indices = outcome.failed_indices();
        if !failed_indices.is_empty() {
            warn!(failed = ?failed_indices, "merging without failed segments");
        }

        session.publish(
            ProgressRecord::new(
                ProgressKind::Merging,
                format!("Merging {successful} segments..."),
            )
            .with_counts(successful, total)
            .with_percentage(100),
        );

        let artifact = self.merger.merge(outcome.successes, label).await?;

        let done = match label.kind {
            ArtifactKind::Template => "Download completed!",
            ArtifactKind::Manifest => "M3U8 download completed!",
        };
        session.publish(
            ProgressRecord::new(
                ProgressKind::Completed,
                format!("{done} File saved: {}", artifact.file_name),
            )
            .with_counts(successful, total)
            .with_percentage(100)
            .with_artifact(artifact.file_name.clone(), artifact.size_mb()),
        );

        info!(
            file = %artifact.file_name,
            successful,
            total,
            size_mb = %artifact.size_mb(),
            "run completed"
        );

        Ok(JobReport {
            session_id: session.session_id().to_string(),
            artifact,
            requested: total,
            playlist_total,
            successful,
            failed_indices,
        })
    }
}

fn publish_failure(session: &SessionProgress, err: &JobError) {
    if err.is_client_error() {
        warn!(session_id = %session.session_id(), error = %err, "request rejected");
    } else {
        error!(session_id = %session.session_id(), error = %err, "run failed");
    }
    session.publish(ProgressRecord::new(ProgressKind::Error, err.to_string()));
}
