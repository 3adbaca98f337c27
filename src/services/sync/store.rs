use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::services::sync::snapshot::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot store unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to write snapshot to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable home of the [`Snapshot`].
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Snapshot, StoreError>;

    /// Replaces the stored snapshot. A later `load` sees either the old or
    /// the new snapshot, never a mix.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// Snapshot kept as a pretty-printed JSON file.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| {
            StoreError::Unavailable {
                path: self.path.clone(),
                source,
            }
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        snapshot.validate().map_err(|reason| StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            artists = snapshot.artists.len(),
            liked = snapshot.last_liked_tracks.len(),
            playlists = snapshot.playlists.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&directory).map_err(|e| self.write_error(e))?;

        // Write next to the target so the final rename stays on one filesystem.
        let mut file = NamedTempFile::new_in(&directory).map_err(|e| self.write_error(e))?;
        serde_json::to_writer_pretty(&mut file, snapshot)
            .map_err(|e| self.write_error(e.into()))?;
        file.write_all(b"\n").map_err(|e| self.write_error(e))?;
        file.as_file().sync_all().map_err(|e| self.write_error(e))?;
        file.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        tracing::debug!(path = %self.path.display(), "Saved snapshot");
        Ok(())
    }
}
