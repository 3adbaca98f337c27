pub mod allocator;
pub mod artists;
pub mod backoff;
pub mod change_detector;
pub mod dedup;
pub mod library;
pub mod orchestrator;
pub mod paginate;
pub mod resolver;
pub mod snapshot;
pub mod store;

use crate::config::SyncSettings;
use crate::ports::catalog::{CatalogError, MusicCatalog};
use crate::services::sync::snapshot::Snapshot;
use crate::services::sync::store::{SnapshotStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] CatalogError),
}

/// Runs the sync and cleanup flows against one catalog and one snapshot store.
pub struct SyncService<C: MusicCatalog, S: SnapshotStore> {
    client: C,
    store: S,
    settings: SyncSettings,
}

impl<C: MusicCatalog, S: SnapshotStore> SyncService<C, S> {
    pub fn new(client: C, store: S, settings: SyncSettings) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SyncError> {
        self.store.save(snapshot).inspect_err(|err| {
            tracing::error!(error = %err, "Failed to save snapshot");
        })?;
        Ok(())
    }
}
