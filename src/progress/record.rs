//! Progress record and stream event types.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// State of a run. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// Request accepted, task list being prepared.
    Starting,
    /// Windows are being fetched.
    Downloading,
    /// Successful segments are being concatenated.
    Merging,
    /// Artifact written.
    Completed,
    /// Run failed.
    Error,
}

impl ProgressKind {
    /// Returns `true` for `Completed` and `Error`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Snapshot of a session's progress. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Current state.
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    /// Unix time in milliseconds when the record was created.
    pub timestamp: u64,
    /// Human-readable status line.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_batch: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(rename = "fileSizeMB", skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<String>,
}

impl ProgressRecord {
    /// Creates a record stamped with the current time.
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: now_millis(),
            message: message.into(),
            completed: None,
            total: None,
            percentage: None,
            current_batch: None,
            total_batches: None,
            total_segments: None,
            filename: None,
            file_size_mb: None,
        }
    }

    /// Sets `completed`/`total` and derives `percentage` from them.
    #[must_use]
    pub fn with_counts(mut self, completed: u64, total: u64) -> Self {
        self.completed = Some(completed);
        self.total = Some(total);
        self.percentage = Some(percentage(completed, total));
        self
    }

    /// Overrides `percentage`.
    #[must_use]
    pub fn with_percentage(mut self, percentage: u32) -> Self {
        self.percentage = Some(percentage);
        self
    }

    /// Sets the window position.
    #[must_use]
    pub fn with_batch(mut self, current: usize, total: usize) -> Self {
        self.current_batch = Some(current);
        self.total_batches = Some(total);
        self
    }

    /// Sets the segment count announced when a template run starts.
    #[must_use]
    pub fn with_total_segments(mut self, total_segments: u64) -> Self {
        self.total_segments = Some(total_segments);
        self
    }

    /// Attaches the artifact name and its size in MB (two decimals).
    #[must_use]
    pub fn with_artifact(
        mut self,
        filename: impl Into<String>,
        file_size_mb: impl Into<String>,
    ) -> Self {
        self.filename = Some(filename.into());
        self.file_size_mb = Some(file_size_mb.into());
        self
    }
}

/// `round(completed / total * 100)`, or 0 when `total` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentage(completed: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

/// Item of a progress subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Acknowledgment sent once when the subscription opens.
    Connected,
    /// Current record of the session.
    Snapshot(ProgressRecord),
}

impl ProgressEvent {
    /// Returns `true` if this event carries a terminal record.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Snapshot(record) if record.kind.is_terminal())
    }
}

impl Serialize for ProgressEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Connected => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("type", "connected")?;
                map.end()
            }
            Self::Snapshot(record) => record.serialize(serializer),
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
