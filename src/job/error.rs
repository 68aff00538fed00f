//! Run-level failures of a download job.

use thiserror::Error;

use super::request::ValidationError;
use crate::download::EngineError;
use crate::merge::MergeError;
use crate::playlist::PlaylistError;

/// Failure that aborts a run.
///
/// Every variant is published as a terminal `error` record and returned to
/// the requester with the same message.
#[derive(Debug, Error)]
pub enum JobError {
    /// Request parameters were rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The manifest could not be fetched, or the sub-range missed it.
    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    /// The manifest listed no segments.
    #[error("No segments found in M3U8 playlist")]
    EmptyPlaylist,

    /// Every segment of the run failed.
    #[error("No segments were successfully downloaded")]
    AllSegmentsFailed,

    /// The artifact could not be written.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The task running the job panicked or was cancelled.
    #[error("Download task aborted")]
    Aborted,
}

impl From<EngineError> for JobError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidConcurrency { .. } => {
                Self::Validation(ValidationError::InvalidConcurrency)
            }
        }
    }
}

impl JobError {
    /// Returns `true` when the requester is at fault (HTTP 400 class).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::EmptyPlaylist
                | Self::Playlist(PlaylistError::RangeOutOfBounds { .. })
        )
    }
}
