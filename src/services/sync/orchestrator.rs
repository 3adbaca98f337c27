use crate::ports::catalog::{CatalogError, MusicCatalog};
use crate::services::sync::allocator::PlaylistAllocator;
use crate::services::sync::backoff::retry;
use crate::services::sync::library::{RefreshMode, refresh_liked_tracks, refresh_playlist_tracks};
use crate::services::sync::resolver::resolve_artist_tracks;
use crate::services::sync::snapshot::{Snapshot, Track};
use crate::services::sync::store::SnapshotStore;
use crate::services::sync::{SyncError, SyncService};

/// Totals of one pass over the artist list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub processed: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub added: usize,
}

enum ArtistOutcome {
    NotFound,
    Added(usize),
}

impl<C: MusicCatalog, S: SnapshotStore> SyncService<C, S> {
    /// Loads the snapshot, brings liked and playlist tracks up to date and
    /// adds every new track of every listed artist.
    #[tracing::instrument(skip_all)]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let mut snapshot = self.store.load()?;

        if refresh_liked_tracks(&self.client, &self.settings, &mut snapshot).await? {
            self.save(&snapshot)?;
        }
        let refreshed =
            refresh_playlist_tracks(&self.client, &self.settings, &mut snapshot, RefreshMode::Resume)
                .await?;
        if refreshed > 0 {
            self.save(&snapshot)?;
        }

        let report = self.sync_artists(&mut snapshot).await?;
        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            not_found = report.not_found,
            added = report.added,
            "Sync finished"
        );
        Ok(report)
    }

    /// Walks the artist list in order. The snapshot is saved after every
    /// artist, and once more on the way out if an artist fails midway.
    pub async fn sync_artists(&self, snapshot: &mut Snapshot) -> Result<SyncReport, SyncError> {
        let mut allocator = PlaylistAllocator::new(&self.settings);
        let mut report = SyncReport::default();
        let artists = snapshot.artists.clone();
        if snapshot.playlists.is_empty() {
            tracing::info!("No managed playlists yet, the first one will be created");
        }

        for (position, name) in artists.iter().enumerate() {
            allocator
                .ensure_capacity(&self.client, &mut snapshot.playlists, 1)
                .await?;

            if let Some(result) = snapshot.results.get_mut(name) {
                result.skipped = true;
                report.skipped += 1;
                tracing::debug!(artist = %name, "Artist already processed, skipping");
                continue;
            }

            tracing::info!(
                artist = %name,
                position = position + 1,
                total = artists.len(),
                playlist = allocator.current_index() + 1,
                "Processing artist"
            );
            match self.sync_artist(snapshot, &mut allocator, name).await {
                Ok(ArtistOutcome::NotFound) => report.not_found += 1,
                Ok(ArtistOutcome::Added(added)) => {
                    report.processed += 1;
                    report.added += added;
                }
                Err(err) => {
                    if let Err(save_err) = self.store.save(snapshot) {
                        tracing::error!(error = %save_err, "Failed to save partial progress");
                    }
                    return Err(err.into());
                }
            }
            self.save(snapshot)?;
        }

        self.save(snapshot)?;
        Ok(report)
    }

    #[tracing::instrument(skip(self, snapshot, allocator))]
    async fn sync_artist(
        &self,
        snapshot: &mut Snapshot,
        allocator: &mut PlaylistAllocator,
        artist_name: &str,
    ) -> Result<ArtistOutcome, CatalogError> {
        let policy = self.settings.backoff();
        let found = retry(policy, "search artist", || {
            self.client.search_artist(artist_name)
        })
        .await?;
        let Some(artist) = found else {
            tracing::warn!("Artist not found in catalog");
            return Ok(ArtistOutcome::NotFound);
        };

        let resolved = resolve_artist_tracks(
            &self.client,
            &self.settings,
            &artist,
            &snapshot.last_liked_tracks,
            &snapshot.playlists,
        )
        .await?;
        snapshot.results.insert(artist_name.to_string(), resolved.result);

        let added = self
            .append_tracks(snapshot, allocator, artist_name, &resolved.tracks)
            .await?;
        tracing::info!(added, "Added tracks");
        Ok(ArtistOutcome::Added(added))
    }

    /// Writes `tracks` in order, splitting them over as many playlists as
    /// needed so that none goes past capacity.
    async fn append_tracks(
        &self,
        snapshot: &mut Snapshot,
        allocator: &mut PlaylistAllocator,
        artist_name: &str,
        tracks: &[Track],
    ) -> Result<usize, CatalogError> {
        let policy = self.settings.backoff();
        let mut remaining = tracks;
        let mut added = 0;

        while !remaining.is_empty() {
            let slot = allocator
                .ensure_capacity(&self.client, &mut snapshot.playlists, remaining.len())
                .await?;
            let (fits, rest) = remaining.split_at(slot.room.min(remaining.len()));

            for batch in fits.chunks(self.settings.add_batch_size) {
                let uris: Vec<String> = batch.iter().map(|track| track.uri.clone()).collect();
                retry(policy, "add tracks to playlist", || {
                    self.client.add_tracks_to_playlist(&slot.playlist_id, &uris)
                })
                .await?;

                snapshot.playlists.record_appended(&slot.playlist_id, batch);
                if let Some(result) = snapshot.results.get_mut(artist_name) {
                    result.added_songs += batch.len() as u32;
                }
                added += batch.len();
                tracing::debug!(
                    playlist_id = %slot.playlist_id,
                    batch = batch.len(),
                    "Appended batch"
                );
            }
            remaining = rest;
        }

        Ok(added)
    }
}
