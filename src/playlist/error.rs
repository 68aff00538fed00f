//! Error types for playlist resolution.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors raised while building a task list from a manifest.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// The manifest could not be retrieved.
    #[error("Failed to fetch M3U8: {0}")]
    Fetch(#[source] DownloadError),

    /// The requested first segment lies past the end of the playlist.
    #[error("startSegment {start} exceeds the {available} segments in the playlist")]
    RangeOutOfBounds {
        /// Requested first segment (1-based).
        start: u64,
        /// Number of segments the playlist contains.
        available: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_wraps_cause() {
        let error = PlaylistError::Fetch(DownloadError::http_status("https://x/i.m3u8", 403));
        assert_eq!(error.to_string(), "Failed to fetch M3U8: HTTP 403: Forbidden");
    }

    #[test]
    fn test_range_error_display() {
        let error = PlaylistError::RangeOutOfBounds {
            start: 9,
            available: 4,
        };
        assert_eq!(
            error.to_string(),
            "startSegment 9 exceeds the 4 segments in the playlist"
        );
    }
}
