//! Error types for the download module.
//!
//! Every variant carries the URL it was raised for so a failed segment or
//! manifest can be reported without extra bookkeeping by the caller.

use thiserror::Error;

/// Errors that can occur while fetching a segment or a manifest.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the configured timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx response.
    #[error("HTTP {status}: {reason}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status, or an empty string.
        reason: String,
    },

    /// The response body could not be read to the end.
    #[error("failed reading body of {url}: {source}")]
    Body {
        /// The URL whose body was truncated.
        url: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error, filling in the canonical reason phrase.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self::HttpStatus {
            url: url.into(),
            status,
            reason,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a body read error.
    pub fn body(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Body {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns the URL the error was raised for.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. }
            | Self::Timeout { url }
            | Self::HttpStatus { url, .. }
            | Self::Body { url, .. }
            | Self::InvalidUrl { url } => url,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL, which the source
// error does not reliably carry. Use the helper constructors instead.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_includes_reason_phrase() {
        let error = DownloadError::http_status("https://cdn.example/seg-1.ts", 404);
        assert_eq!(error.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn test_http_status_unknown_code_has_empty_reason() {
        let error = DownloadError::http_status("https://cdn.example/seg-1.ts", 599);
        let msg = error.to_string();
        assert!(msg.starts_with("HTTP 599"), "unexpected message: {msg}");
    }

    #[test]
    fn test_timeout_display() {
        let error = DownloadError::timeout("https://cdn.example/seg-9.ts");
        let msg = error.to_string();
        assert!(msg.contains("timeout"));
        assert!(msg.contains("https://cdn.example/seg-9.ts"));
    }

    #[test]
    fn test_invalid_url_display() {
        let error = DownloadError::invalid_url("not-a-url");
        assert_eq!(error.to_string(), "invalid URL: not-a-url");
    }

    #[test]
    fn test_url_accessor_covers_variants() {
        assert_eq!(DownloadError::timeout("a").url(), "a");
        assert_eq!(DownloadError::http_status("b", 500).url(), "b");
        assert_eq!(DownloadError::invalid_url("c").url(), "c");
    }
}
