//! Task list construction: manifest parsing and URL template expansion.
//!
//! Manifest parsing is deliberately line-based: every non-empty line that
//! does not start with `#` is a segment reference, in file order. Directives
//! (keys, variant streams, byte ranges) are skipped, never interpreted.

mod error;

use tracing::{debug, info, instrument};
use url::Url;

pub use error::PlaylistError;

use crate::download::{HttpClient, SegmentTask};

/// Literal placeholder replaced by the segment number in URL templates.
pub const TEMPLATE_PLACEHOLDER: &str = "{n}";

/// Fetches manifests and turns them into ordered task lists.
#[derive(Debug, Clone)]
pub struct PlaylistResolver {
    client: HttpClient,
}

impl PlaylistResolver {
    /// Creates a resolver that fetches manifests with `client`.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Fetches `manifest_url` and returns its segment references as tasks.
    ///
    /// An empty result is not an error here; callers decide how to treat a
    /// manifest without segments.
    ///
    /// # Errors
    ///
    /// Returns [`PlaylistError::Fetch`] if the manifest cannot be retrieved.
    #[instrument(skip(self), fields(manifest_url = %manifest_url))]
    pub async fn resolve(&self, manifest_url: &str) -> Result<Vec<SegmentTask>, PlaylistError> {
        info!("fetching playlist");
        let body = self
            .client
            .get_text(manifest_url)
            .await
            .map_err(PlaylistError::Fetch)?;

        let tasks = parse_playlist(&body, manifest_url);
        info!(segments = tasks.len(), "found segments in playlist");
        Ok(tasks)
    }
}

/// Parses manifest text into tasks indexed `1..` in line order.
///
/// Relative references are prefixed with [`manifest_base`] of `manifest_url`.
#[must_use]
pub fn parse_playlist(body: &str, manifest_url: &str) -> Vec<SegmentTask> {
    let base = manifest_base(manifest_url);

    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .zip(1u64..)
        .map(|(reference, index)| {
            let url = if is_absolute(reference) {
                reference.to_string()
            } else {
                format!("{base}{reference}")
            };
            SegmentTask::new(url, index)
        })
        .collect()
}

/// Directory part of a manifest URL: everything up to and including the last `/`.
#[must_use]
pub fn manifest_base(manifest_url: &str) -> &str {
    manifest_url
        .rfind('/')
        .map_or("", |pos| &manifest_url[..=pos])
}

fn is_absolute(reference: &str) -> bool {
    Url::parse(reference).is_ok_and(|url| !url.cannot_be_a_base())
}

/// Expands a URL template into tasks for `start..=end`.
///
/// The first `{n}` in `template` is replaced by the segment number, which is
/// also the task index.
#[must_use]
pub fn expand_template(template: &str, start: u64, end: u64) -> Vec<SegmentTask> {
    (start..=end)
        .map(|n| SegmentTask::new(template.replacen(TEMPLATE_PLACEHOLDER, &n.to_string(), 1), n))
        .collect()
}

/// Selects the inclusive 1-based sub-range `start..=end` of a resolved list.
///
/// `end` is clamped to the list length and defaults to it; `start` defaults
/// to 1. Tasks keep their original indices.
///
/// # Errors
///
/// Returns [`PlaylistError::RangeOutOfBounds`] when `start` is past the
/// last segment.
pub fn select_range(
    tasks: Vec<SegmentTask>,
    start: Option<u64>,
    end: Option<u64>,
) -> Result<Vec<SegmentTask>, PlaylistError> {
    let available = tasks.len() as u64;
    let start = start.unwrap_or(1).max(1);
    let end = end.unwrap_or(available).min(available);

    if start > available {
        return Err(PlaylistError::RangeOutOfBounds { start, available });
    }

    debug!(start, end, available, "selecting playlist range");
    Ok(tasks
        .into_iter()
        .filter(|task| (start..=end).contains(&task.index))
        .collect())
}
