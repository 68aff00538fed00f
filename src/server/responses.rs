//! JSON bodies returned by the HTTP routes.

use serde::Serialize;

use crate::artifacts::ArtifactEntry;
use crate::job::JobReport;

/// Body of a successful download run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody {
    /// Always `true`.
    pub success: bool,
    /// Session the run published to.
    pub session_id: String,
    /// Server-relative path of the artifact, served by `GET /files/:filename`.
    pub file: String,
    /// Absolute URL the artifact can be fetched from.
    pub download_url: String,
    /// Run statistics.
    pub stats: RunStats,
}

impl SuccessBody {
    /// Builds the body for `report`, with `download_url` pointing at the artifact.
    #[must_use]
    pub fn from_report(report: &JobReport, download_url: String) -> Self {
        Self {
            success: true,
            session_id: report.session_id.clone(),
            file: format!("/files/{}", report.artifact.file_name),
            download_url,
            stats: RunStats::from(report),
        }
    }
}

/// Segment and size statistics of a run.
///
/// Template runs report `totalSegments`; manifest runs report
/// `totalSegmentsInPlaylist` and `segmentsRequested` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments_in_playlist: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments_requested: Option<u64>,
    pub successful_segments: u64,
    pub failed_segments: u64,
    pub file_size_bytes: u64,
    #[serde(rename = "fileSizeMB")]
    pub file_size_mb: String,
    pub failed_segment_numbers: Vec<u64>,
}

impl From<&JobReport> for RunStats {
    fn from(report: &JobReport) -> Self {
        let (total_segments, total_segments_in_playlist, segments_requested) =
            match report.playlist_total {
                Some(playlist_total) => (None, Some(playlist_total), Some(report.requested)),
                None => (Some(report.requested), None, None),
            };
        Self {
            total_segments,
            total_segments_in_playlist,
            segments_requested,
            successful_segments: report.successful,
            failed_segments: report.failed_indices.len() as u64,
            file_size_bytes: report.artifact.size_bytes,
            file_size_mb: report.artifact.size_mb(),
            failed_segment_numbers: report.failed_indices.clone(),
        }
    }
}

/// Body of any failed request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Session of the rejected run, for download routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Human-readable message.
    pub error: String,
}

impl ErrorBody {
    /// Error body for a download route.
    #[must_use]
    pub fn for_session(session_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: Some(session_id.to_string()),
            error: error.into(),
        }
    }

    /// Error body without a session.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: None,
            error: error.into(),
        }
    }
}

/// One entry of `GET /files`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntryBody {
    pub name: String,
    pub size: u64,
    #[serde(rename = "sizeMB")]
    pub size_mb: String,
    pub created: u64,
    pub download_url: String,
}

impl FileEntryBody {
    pub(crate) fn new(entry: &ArtifactEntry, download_url: String) -> Self {
        Self {
            name: entry.name.clone(),
            size: entry.size,
            size_mb: entry.size_mb(),
            created: entry.created,
            download_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct FileListBody {
    pub success: bool,
    pub files: Vec<FileEntryBody>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageBody {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::merge::MergedArtifact;

    fn report(playlist_total: Option<u64>) -> JobReport {
        JobReport {
            session_id: "s1".into(),
            artifact: MergedArtifact {
                path: PathBuf::from("/tmp/merged-1-10-5.ts"),
                file_name: "merged-1-10-5.ts".into(),
                size_bytes: 2_097_152,
                segments: 8,
            },
            requested: 10,
            playlist_total,
            successful: 8,
            failed_indices: vec![3, 7],
        }
    }

    #[test]
    fn test_template_success_body_shape() {
        let body =
            SuccessBody::from_report(&report(None), "http://h/files/merged-1-10-5.ts".into());
        let value = serde_json::to_value(&body).unwrap_or_default();

        assert_eq!(
            value,
            json!({
                "success": true,
                "sessionId": "s1",
                "file": "/files/merged-1-10-5.ts",
                "downloadUrl": "http://h/files/merged-1-10-5.ts",
                "stats": {
                    "totalSegments": 10,
                    "successfulSegments": 8,
                    "failedSegments": 2,
                    "fileSizeBytes": 2_097_152,
                    "fileSizeMB": "2.00",
                    "failedSegmentNumbers": [3, 7]
                }
            })
        );
    }

    #[test]
    fn test_manifest_stats_replace_total_segments() {
        let stats = serde_json::to_value(RunStats::from(&report(Some(40)))).unwrap_or_default();

        assert_eq!(stats["totalSegmentsInPlaylist"], 40);
        assert_eq!(stats["segmentsRequested"], 10);
        assert!(stats.get("totalSegments").is_none());
    }

    #[test]
    fn test_error_body_shapes() {
        let with_session =
            serde_json::to_value(ErrorBody::for_session("s", "boom")).unwrap_or_default();
        assert_eq!(with_session, json!({"success": false, "sessionId": "s", "error": "boom"}));

        let plain = serde_json::to_value(ErrorBody::new("File not found")).unwrap_or_default();
        assert_eq!(plain, json!({"success": false, "error": "File not found"}));
    }
}
