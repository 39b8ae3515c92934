//! Content digests used to detect whether a tool modified a file.

use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to read '{}': {source}", path.display())]
pub struct SnapshotError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// SHA-256 digest of a file's content at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot([u8; 32]);

impl FileSnapshot {
    /// Reads and hashes the file at `path`.
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    pub async fn take(path: &Path) -> Result<Self, SnapshotError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|source| SnapshotError {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::of(&contents))
    }

    #[must_use]
    pub fn of(contents: &[u8]) -> Self {
        Self(Sha256::digest(contents).into())
    }
}
