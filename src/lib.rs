//! Segment Downloader Library
//!
//! Fetches the numbered segments of an HTTP-delivered media stream, either
//! from a URL template with a numeric range or from a playlist manifest,
//! downloads them in bounded-concurrency windows with per-segment retry,
//! concatenates the successes in index order into one `.ts` file and
//! publishes live progress per session.
//!
//! # Architecture
//!
//! - [`download`] - HTTP client, retrying segment fetcher and windowed engine
//! - [`playlist`] - manifest parsing and URL template expansion
//! - [`progress`] - per-session progress records and subscription streams
//! - [`merge`] - ordered concatenation into a uniquely named artifact
//! - [`job`] - request validation and the end-to-end run lifecycle
//! - [`artifacts`] - listing and deleting merged files
//! - [`server`] - axum routes over all of the above

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod artifacts;
pub mod download;
pub mod job;
pub mod merge;
pub mod playlist;
pub mod progress;
pub mod server;
mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use artifacts::{ArtifactEntry, ArtifactError, ArtifactStore};
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, DownloadEngine, DownloadError, EngineError,
    HttpClient, RetryPolicy, SegmentFetcher, SegmentResult, SegmentTask, Sleeper,
};
pub use job::{JobError, JobReport, JobRunner, ManifestRequest, TemplateRequest, ValidationError};
pub use merge::{ArtifactKind, ArtifactLabel, MergeError, MergeWriter, MergedArtifact};
pub use playlist::{PlaylistError, PlaylistResolver, expand_template, parse_playlist};
pub use progress::{ProgressEvent, ProgressKind, ProgressRecord, ProgressStore};
pub use server::{AppState, router};
