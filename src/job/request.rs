//! Request parameters for the two download routes and their validation.
//!
//! Query values arrive as strings. Parsing and range checks happen here,
//! before any progress run or network activity starts.

use std::collections::HashMap;

use thiserror::Error;

use crate::download::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::playlist::TEMPLATE_PLACEHOLDER;
use crate::progress::now_millis;

/// Default first index for template runs.
pub const DEFAULT_TEMPLATE_START: u64 = 1;
/// Default last index for template runs.
pub const DEFAULT_TEMPLATE_END: u64 = 20;
/// Default upper bound on the number of segments one template run may cover.
pub const DEFAULT_MAX_SEGMENTS: u64 = 10_000;

/// Malformed or out-of-range request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Template range unparseable, `start < 1` or `start > end`.
    #[error("Invalid start or end values. Start must be >= 1 and <= end")]
    InvalidRange,

    /// Manifest sub-range unparseable, below 1 or inverted.
    #[error("Invalid startSegment or endSegment values. startSegment must be >= 1 and <= endSegment")]
    InvalidSegmentRange,

    /// Concurrency unparseable or outside `1..=20`.
    #[error("Concurrency must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}")]
    InvalidConcurrency,

    /// `baseUrl` absent.
    #[error("baseUrl is required")]
    MissingBaseUrl,

    /// `baseUrl` without the `{n}` placeholder.
    #[error("baseUrl must contain {{n}} placeholder for segment numbers")]
    MissingPlaceholder,

    /// `m3u8Url` absent.
    #[error("M3U8 URL is required")]
    MissingManifestUrl,

    /// Template range longer than the configured maximum.
    #[error("Range covers {requested} segments; at most {max} are allowed per download")]
    TooManySegments {
        /// Segments in `start..=end`.
        requested: u64,
        /// Configured maximum.
        max: u64,
    },
}

/// Validated parameters of an expand-and-download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest {
    /// URL template containing `{n}`.
    pub base_url: String,
    /// First segment number (inclusive).
    pub start: u64,
    /// Last segment number (inclusive).
    pub end: u64,
    /// Window size.
    pub concurrency: usize,
}

impl TemplateRequest {
    /// Parses `baseUrl`, `start`, `end` and `concurrency` from a query map.
    ///
    /// Checks run in a fixed order: range, concurrency, template.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn from_query(
        query: &HashMap<String, String>,
        default_concurrency: usize,
    ) -> Result<Self, ValidationError> {
        let start = parse_or(query, "start", DEFAULT_TEMPLATE_START)
            .ok_or(ValidationError::InvalidRange)?;
        let end =
            parse_or(query, "end", DEFAULT_TEMPLATE_END).ok_or(ValidationError::InvalidRange)?;
        if start < 1 || start > end {
            return Err(ValidationError::InvalidRange);
        }

        let concurrency = parse_concurrency(query, default_concurrency)?;

        let base_url = query
            .get("baseUrl")
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::MissingBaseUrl)?;
        if !base_url.contains(TEMPLATE_PLACEHOLDER) {
            return Err(ValidationError::MissingPlaceholder);
        }

        Ok(Self {
            base_url: base_url.clone(),
            start,
            end,
            concurrency,
        })
    }

    /// Number of segments in `start..=end`, zero for an inverted range.
    #[must_use]
    pub fn segment_count(&self) -> u64 {
        if self.end < self.start {
            return 0;
        }
        (self.end - self.start).saturating_add(1)
    }

    /// Re-checks the range of a request that may not have come through
    /// [`TemplateRequest::from_query`] and bounds its length.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRange`] for `start < 1` or
    /// `start > end` and [`ValidationError::TooManySegments`] when the range
    /// covers more than `max_segments`.
    pub fn check_bounds(&self, max_segments: u64) -> Result<(), ValidationError> {
        if self.start < 1 || self.start > self.end {
            return Err(ValidationError::InvalidRange);
        }
        let requested = self.segment_count();
        if requested > max_segments {
            return Err(ValidationError::TooManySegments {
                requested,
                max: max_segments,
            });
        }
        Ok(())
    }
}

/// Validated parameters of a manifest-download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRequest {
    /// Manifest location.
    pub manifest_url: String,
    /// Optional first segment (1-based).
    pub start: Option<u64>,
    /// Optional last segment (inclusive); clamped after resolution.
    pub end: Option<u64>,
    /// Window size.
    pub concurrency: usize,
}

impl ManifestRequest {
    /// Parses `m3u8Url`, `startSegment`, `endSegment` and `concurrency`.
    ///
    /// Empty sub-range values count as absent.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn from_query(
        query: &HashMap<String, String>,
        default_concurrency: usize,
    ) -> Result<Self, ValidationError> {
        let manifest_url = query
            .get("m3u8Url")
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::MissingManifestUrl)?
            .clone();

        let concurrency = parse_concurrency(query, default_concurrency)?;

        let start = parse_optional(query, "startSegment")?;
        let end = parse_optional(query, "endSegment")?;
        if start.is_some_and(|s| s < 1) || end.is_some_and(|e| e < 1) {
            return Err(ValidationError::InvalidSegmentRange);
        }
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ValidationError::InvalidSegmentRange);
            }
        }

        Ok(Self {
            manifest_url,
            start,
            end,
            concurrency,
        })
    }
}

/// Client-supplied `sessionId`, or the current Unix time in milliseconds.
#[must_use]
pub fn session_id_from(query: &HashMap<String, String>) -> String {
    query
        .get("sessionId")
        .filter(|value| !value.is_empty())
        .cloned()
        .unwrap_or_else(|| now_millis().to_string())
}

fn parse_or(query: &HashMap<String, String>, key: &str, default: u64) -> Option<u64> {
    match query.get(key) {
        None => Some(default),
        Some(raw) => raw.trim().parse().ok(),
    }
}

fn parse_optional(
    query: &HashMap<String, String>,
    key: &str,
) -> Result<Option<u64>, ValidationError> {
    match query.get(key).map(|raw| raw.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::InvalidSegmentRange),
    }
}

fn parse_concurrency(
    query: &HashMap<String, String>,
    default_concurrency: usize,
) -> Result<usize, ValidationError> {
    let concurrency = match query.get("concurrency") {
        None => default_concurrency,
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidConcurrency)?,
    };
    if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
        return Err(ValidationError::InvalidConcurrency);
    }
    Ok(concurrency)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "https://cdn.example/seg-{n}.ts";

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_template_defaults() {
        let request = TemplateRequest::from_query(&query(&[("baseUrl", TEMPLATE)]), 5).unwrap();
        assert_eq!(request.start, 1);
        assert_eq!(request.end, 20);
        assert_eq!(request.concurrency, 5);
        assert_eq!(request.segment_count(), 20);
    }

    #[test]
    fn test_template_inverted_range_rejected() {
        let result = TemplateRequest::from_query(
            &query(&[("baseUrl", TEMPLATE), ("start", "5"), ("end", "3")]),
            5,
        );
        assert_eq!(result, Err(ValidationError::InvalidRange));
    }

    #[test]
    fn test_template_start_zero_rejected() {
        let result = TemplateRequest::from_query(
            &query(&[("baseUrl", TEMPLATE), ("start", "0"), ("end", "3")]),
            5,
        );
        assert_eq!(result, Err(ValidationError::InvalidRange));
    }

    #[test]
    fn test_template_unparseable_values_rejected() {
        for (key, value) in [("start", "abc"), ("end", "-1"), ("start", "")] {
            let result =
                TemplateRequest::from_query(&query(&[("baseUrl", TEMPLATE), (key, value)]), 5);
            assert_eq!(result, Err(ValidationError::InvalidRange), "{key}={value}");
        }
    }

    #[test]
    fn test_concurrency_bounds() {
        for bad in ["0", "21", "x"] {
            let result = TemplateRequest::from_query(
                &query(&[("baseUrl", TEMPLATE), ("concurrency", bad)]),
                5,
            );
            assert_eq!(result, Err(ValidationError::InvalidConcurrency), "{bad}");
        }
        for good in ["1", "20"] {
            let request = TemplateRequest::from_query(
                &query(&[("baseUrl", TEMPLATE), ("concurrency", good)]),
                5,
            )
            .unwrap();
            assert_eq!(request.concurrency.to_string(), good);
        }
    }

    #[test]
    fn test_range_is_checked_before_concurrency() {
        let result = TemplateRequest::from_query(
            &query(&[("baseUrl", TEMPLATE), ("start", "9"), ("end", "1"), ("concurrency", "0")]),
            5,
        );
        assert_eq!(result, Err(ValidationError::InvalidRange));
    }

    #[test]
    fn test_template_placeholder_required() {
        let missing = TemplateRequest::from_query(&query(&[]), 5);
        assert_eq!(missing, Err(ValidationError::MissingBaseUrl));

        let no_placeholder =
            TemplateRequest::from_query(&query(&[("baseUrl", "https://cdn.example/seg.ts")]), 5);
        assert_eq!(no_placeholder, Err(ValidationError::MissingPlaceholder));
        assert_eq!(
            ValidationError::MissingPlaceholder.to_string(),
            "baseUrl must contain {n} placeholder for segment numbers"
        );
    }

    #[test]
    fn test_manifest_requires_url() {
        let result = ManifestRequest::from_query(&query(&[("concurrency", "3")]), 5);
        assert_eq!(result, Err(ValidationError::MissingManifestUrl));
        assert_eq!(
            ValidationError::MissingManifestUrl.to_string(),
            "M3U8 URL is required"
        );
    }

    #[test]
    fn test_manifest_sub_range_parsing() {
        let request = ManifestRequest::from_query(
            &query(&[("m3u8Url", "https://x/i.m3u8"), ("startSegment", "2"), ("endSegment", "")]),
            4,
        )
        .unwrap();
        assert_eq!(request.start, Some(2));
        assert_eq!(request.end, None);
        assert_eq!(request.concurrency, 4);
    }

    #[test]
    fn test_manifest_invalid_sub_range() {
        for pairs in [
            [("startSegment", "0"), ("endSegment", "4")],
            [("startSegment", "5"), ("endSegment", "4")],
            [("startSegment", "x"), ("endSegment", "4")],
        ] {
            let mut q = query(&pairs);
            q.insert("m3u8Url".into(), "https://x/i.m3u8".into());
            assert_eq!(
                ManifestRequest::from_query(&q, 5),
                Err(ValidationError::InvalidSegmentRange)
            );
        }
    }

    #[test]
    fn test_template_bounds_reject_oversized_range() {
        let request = TemplateRequest::from_query(
            &query(&[("baseUrl", TEMPLATE), ("start", "1"), ("end", "18446744073709551615")]),
            5,
        )
        .unwrap();

        assert_eq!(request.segment_count(), u64::MAX);
        assert_eq!(
            request.check_bounds(DEFAULT_MAX_SEGMENTS),
            Err(ValidationError::TooManySegments {
                requested: u64::MAX,
                max: DEFAULT_MAX_SEGMENTS,
            })
        );
    }

    #[test]
    fn test_template_bounds_accept_exact_maximum() {
        let mut request = TemplateRequest::from_query(&query(&[("baseUrl", TEMPLATE)]), 5).unwrap();
        request.start = 11;
        request.end = 20;
        assert_eq!(request.check_bounds(10), Ok(()));
        request.end = 21;
        assert!(matches!(
            request.check_bounds(10),
            Err(ValidationError::TooManySegments { requested: 11, max: 10 })
        ));
        request.start = 0;
        assert_eq!(request.check_bounds(10), Err(ValidationError::InvalidRange));
    }

    #[test]
    fn test_session_id_supplied_or_generated() {
        assert_eq!(session_id_from(&query(&[("sessionId", "abc")])), "abc");

        let generated = session_id_from(&query(&[]));
        assert!(generated.parse::<u64>().is_ok());
    }
}
