//! Ordered concatenation of downloaded segments into one `.ts` artifact.
//!
//! Segment bodies are written in ascending index order, never in completion
//! order. The bytes go to a hidden `.part` file in the output directory that
//! is linked under its final name only after a successful flush, so a listing
//! of the directory never shows a half-written artifact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use crate::download::SegmentSuccess;
use crate::progress::now_millis;

/// Extension of every merged artifact.
pub const ARTIFACT_EXTENSION: &str = "ts";

const MAX_NAME_SUFFIX: u32 = 1000;

static PART_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Errors raised while writing an artifact.
#[derive(Debug, Error)]
pub enum MergeError {
    /// File system failure at `path`.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being written or created.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Nothing to merge.
    #[error("no segments to merge")]
    Empty,

    /// Every candidate name in the output directory was taken.
    #[error("no free artifact name for {stem}")]
    NameExhausted {
        /// Name stem that could not be made unique.
        stem: String,
    },
}

impl MergeError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Kind of run that produced an artifact; selects the file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// URL template run (`merged-...`).
    Template,
    /// Manifest run (`m3u8-merged-...`).
    Manifest,
}

impl ArtifactKind {
    /// File name prefix for this kind.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Template => "merged",
            Self::Manifest => "m3u8-merged",
        }
    }
}

/// Inputs to the artifact name: `<prefix>-<start>-<end>-<millis>.ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactLabel {
    /// Run kind.
    pub kind: ArtifactKind,
    /// First requested index.
    pub start: u64,
    /// Last requested index.
    pub end: u64,
}

impl ArtifactLabel {
    /// Creates a label.
    #[must_use]
    pub fn new(kind: ArtifactKind, start: u64, end: u64) -> Self {
        Self { kind, start, end }
    }

    /// Name stem (without extension) stamped with `millis`.
    #[must_use]
    pub fn stem(&self, millis: u64) -> String {
        format!("{}-{}-{}-{millis}", self.kind.prefix(), self.start, self.end)
    }
}

/// An artifact that has been written and linked into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedArtifact {
    /// Full path of the artifact.
    pub path: PathBuf,
    /// File name inside the output directory.
    pub file_name: String,
    /// Total bytes written.
    pub size_bytes: u64,
    /// Number of segments concatenated.
    pub segments: usize,
}

impl MergedArtifact {
    /// Size in MiB with two decimals, as shown to clients.
    #[must_use]
    pub fn size_mb(&self) -> String {
        format_mb(self.size_bytes)
    }
}

/// Formats a byte count as MiB with two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}

/// Writes merged artifacts into one output directory.
#[derive(Debug, Clone)]
pub struct MergeWriter {
    output_dir: PathBuf,
}

impl MergeWriter {
    /// Creates a writer targeting `output_dir`. The directory is created on first write.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory artifacts are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Concatenates `segments` in ascending index order into a new artifact.
    ///
    /// The input order is irrelevant; segments are sorted by index first.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Empty`] for an empty input and
    /// [`MergeError::Io`] if the directory, part file or final link fails. On
    /// error no partial artifact is left behind.
    pub async fn merge(
        &self,
        segments: Vec<SegmentSuccess>,
        label: ArtifactLabel,
    ) -> Result<MergedArtifact, MergeError> {
        self.merge_stamped(segments, label, now_millis()).await
    }

    #[instrument(skip(self, segments), fields(segments = segments.len(), output_dir = %self.output_dir.display()))]
    async fn merge_stamped(
        &self,
        mut segments: Vec<SegmentSuccess>,
        label: ArtifactLabel,
        millis: u64,
    ) -> Result<MergedArtifact, MergeError> {
        if segments.is_empty() {
            return Err(MergeError::Empty);
        }
        segments.sort_by_key(|segment| segment.index);

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| MergeError::io(&self.output_dir, e))?;

        let stem = label.stem(millis);
        let sequence = PART_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let part_path = self
            .output_dir
            .join(format!(".{stem}.{sequence}.{ARTIFACT_EXTENSION}.part"));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part_path)
            .await
            .map_err(|e| MergeError::io(&part_path, e))?;

        let size_bytes = match write_segments(file, &segments, &part_path).await {
            Ok(size) => size,
            Err(err) => {
                debug!(path = %part_path.display(), "removing part file after write error");
                let _ = fs::remove_file(&part_path).await;
                return Err(err);
            }
        };

        let final_path = match self.place(&part_path, &stem).await {
            Ok(path) => path,
            Err(err) => {
                let _ = fs::remove_file(&part_path).await;
                return Err(err);
            }
        };

        let file_name = final_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(
            path = %final_path.display(),
            bytes = size_bytes,
            segments = segments.len(),
            "artifact written"
        );

        Ok(MergedArtifact {
            path: final_path,
            file_name,
            size_bytes,
            segments: segments.len(),
        })
    }

    /// Links the part file to the first free `<stem>[-N].ts` name, then
    /// drops the part name.
    ///
    /// `hard_link` fails with `AlreadyExists` when the name is taken, so the
    /// claim is atomic across concurrent runs sharing a stem.
    async fn place(&self, part_path: &Path, stem: &str) -> Result<PathBuf, MergeError> {
        for suffix in 1..MAX_NAME_SUFFIX {
            let name = if suffix == 1 {
                format!("{stem}.{ARTIFACT_EXTENSION}")
            } else {
                format!("{stem}-{suffix}.{ARTIFACT_EXTENSION}")
            };
            let candidate = self.output_dir.join(name);

            match fs::hard_link(part_path, &candidate).await {
                Ok(()) => {
                    if let Err(err) = fs::remove_file(part_path).await {
                        warn!(path = %part_path.display(), error = %err, "part file left behind");
                    }
                    return Ok(candidate);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(MergeError::io(&candidate, err)),
            }
        }

        Err(MergeError::NameExhausted {
            stem: stem.to_string(),
        })
    }
}

async fn write_segments(
    file: File,
    segments: &[SegmentSuccess],
    path: &Path,
) -> Result<u64, MergeError> {
    let mut writer = BufWriter::new(file);
    let mut written: u64 = 0;

    for segment in segments {
        writer
            .write_all(&segment.bytes)
            .await
            .map_err(|e| MergeError::io(path, e))?;
        written += segment.bytes.len() as u64;
    }

    writer.flush().await.map_err(|e| MergeError::io(path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| MergeError::io(path, e))?;

    Ok(written)
}
