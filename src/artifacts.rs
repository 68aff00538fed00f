//! Listing, opening and deleting merged artifacts in the output directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::merge::{ARTIFACT_EXTENSION, format_mb};

/// Errors raised by artifact operations.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The name contains a path separator or a `..` sequence.
    #[error("Invalid filename")]
    InvalidName {
        /// Rejected name.
        name: String,
    },

    /// No such artifact.
    #[error("File not found")]
    NotFound {
        /// Requested name.
        name: String,
    },

    /// File system failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// One artifact in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Creation (or, where unsupported, modification) time in Unix ms.
    pub created: u64,
}

impl ArtifactEntry {
    /// Size in MiB with two decimals.
    #[must_use]
    pub fn size_mb(&self) -> String {
        format_mb(self.size)
    }
}

/// Read/delete access to the artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory this store reads from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists visible `.ts` files, newest first.
    ///
    /// A missing directory lists as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] if the directory cannot be read.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn list(&self) -> Result<Vec<ArtifactEntry>, ArtifactError> {
        let mut reader = match fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(ArtifactError::io(&self.dir, err)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ArtifactError::io(&self.dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !is_artifact_name(&name) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) => {
                    debug!(name, error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map_or(0, unix_millis);

            entries.push(ArtifactEntry {
                name,
                size: metadata.len(),
                created,
            });
        }

        entries.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.name.cmp(&b.name)));
        debug!(count = entries.len(), "listed artifacts");
        Ok(entries)
    }

    /// Resolves `name` to an existing artifact path and its size.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::InvalidName`] for unsafe names and
    /// [`ArtifactError::NotFound`] if no such file exists.
    pub async fn locate(&self, name: &str) -> Result<(PathBuf, u64), ArtifactError> {
        let path = self.checked_path(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok((path, metadata.len())),
            Ok(_) => Err(ArtifactError::NotFound {
                name: name.to_string(),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ArtifactError::NotFound {
                name: name.to_string(),
            }),
            Err(err) => Err(ArtifactError::io(path, err)),
        }
    }

    /// Deletes the artifact called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::InvalidName`] for unsafe names,
    /// [`ArtifactError::NotFound`] if it does not exist, and
    /// [`ArtifactError::Io`] if removal fails.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn delete(&self, name: &str) -> Result<(), ArtifactError> {
        let (path, _) = self.locate(name).await?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(name, "artifact deleted");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ArtifactError::NotFound {
                name: name.to_string(),
            }),
            Err(err) => Err(ArtifactError::io(path, err)),
        }
    }

    fn checked_path(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        if is_safe_name(name) {
            Ok(self.dir.join(name))
        } else {
            Err(ArtifactError::InvalidName {
                name: name.to_string(),
            })
        }
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && !name.contains('\0')
}

fn is_artifact_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == ARTIFACT_EXTENSION)
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_list_only_visible_ts_files_newest_first() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("merged-1-2-1.ts"), b"old").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(dir.path().join("m3u8-merged-1-2-2.ts"), b"newer").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join(".merged-1-2-3.0.ts.part"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested.ts")).unwrap();

        let entries = ArtifactStore::new(dir.path()).list().await.unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["m3u8-merged-1-2-2.ts", "merged-1-2-1.ts"]);
        assert_eq!(entries[0].size, 5);
        assert_eq!(entries[0].size_mb(), "0.00");
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("absent"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_existing_and_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.ts"), b"x").unwrap();
        let store = ArtifactStore::new(dir.path());

        store.delete("a.ts").await.unwrap();
        assert!(!dir.path().join("a.ts").exists());

        let again = store.delete("a.ts").await;
        assert!(matches!(again, Err(ArtifactError::NotFound { .. })));
        assert_eq!(again.unwrap_err().to_string(), "File not found");
    }

    #[tokio::test]
    async fn test_unsafe_names_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("public"));
        std::fs::write(dir.path().join("secret.ts"), b"x").unwrap();

        for name in ["../secret.ts", "a/b.ts", "a\\b.ts", "..", ""] {
            let result = store.delete(name).await;
            assert!(
                matches!(result, Err(ArtifactError::InvalidName { .. })),
                "{name:?}"
            );
        }
        assert!(dir.path().join("secret.ts").exists());
    }

    #[tokio::test]
    async fn test_locate_returns_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.ts"), b"12345").unwrap();
        let store = ArtifactStore::new(dir.path());

        let (path, size) = store.locate("b.ts").await.unwrap();
        assert_eq!(path, dir.path().join("b.ts"));
        assert_eq!(size, 5);
        assert!(matches!(
            store.locate("c.ts").await,
            Err(ArtifactError::NotFound { .. })
        ));
    }
}
