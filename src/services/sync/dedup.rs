use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::future::Future;

use crate::ports::catalog::{CatalogError, MusicCatalog};
use crate::services::sync::artists::dedup_artists;
use crate::services::sync::backoff::retry;
use crate::services::sync::library::{RefreshMode, refresh_liked_tracks, refresh_playlist_tracks};
use crate::services::sync::snapshot::{Snapshot, Track};
use crate::services::sync::store::SnapshotStore;
use crate::services::sync::{SyncError, SyncService};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    /// Also drop playlist tracks that are already liked.
    pub prune_liked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub duplicate_artists: usize,
    pub liked_duplicates: usize,
    pub playlist_duplicates: usize,
    pub pruned_liked: usize,
}

/// Positions of every track whose `(name, artist)` already appeared earlier.
/// First occurrences are never reported.
pub fn find_duplicates(tracks: &[Track]) -> Vec<usize> {
    let mut first_seen: HashMap<(&str, &str), usize> = HashMap::with_capacity(tracks.len());
    tracks
        .iter()
        .enumerate()
        .filter_map(|(position, track)| match first_seen.entry(track.identity()) {
            Entry::Occupied(_) => Some(position),
            Entry::Vacant(slot) => {
                slot.insert(position);
                None
            }
        })
        .collect()
}

/// Splits `tracks` into the ones to keep and the ones at `positions`.
fn split_out(tracks: &[Track], positions: &[usize]) -> (Vec<Track>, Vec<Track>) {
    let positions: HashSet<usize> = positions.iter().copied().collect();
    let mut kept = Vec::with_capacity(tracks.len() - positions.len());
    let mut removed = Vec::with_capacity(positions.len());
    for (position, track) in tracks.iter().enumerate() {
        if positions.contains(&position) {
            removed.push(track.clone());
        } else {
            kept.push(track.clone());
        }
    }
    (kept, removed)
}

fn unique_uris<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Vec<String> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|track| seen.insert(track.uri.as_str()))
        .map(|track| track.uri.clone())
        .collect()
}

impl<C: MusicCatalog, S: SnapshotStore> SyncService<C, S> {
    /// Maintenance run: tidies the artist list, removes duplicate liked and
    /// playlist tracks and, when asked, playlist tracks that are already liked.
    #[tracing::instrument(skip(self))]
    pub async fn cleanup(&self, options: CleanupOptions) -> Result<CleanupReport, SyncError> {
        let mut snapshot = self.store.load()?;
        let mut report = CleanupReport {
            duplicate_artists: dedup_artists(&mut snapshot.artists),
            ..Default::default()
        };
        if report.duplicate_artists > 0 {
            tracing::info!(removed = report.duplicate_artists, "Removed duplicate artists");
            self.save(&snapshot)?;
        }

        report.liked_duplicates = self.dedup_liked_tracks(&mut snapshot).await?;
        report.playlist_duplicates = self.dedup_playlists(&mut snapshot).await?;
        if options.prune_liked {
            report.pruned_liked = self.prune_liked_from_playlists(&mut snapshot).await?;
        }

        tracing::info!(?report, "Cleanup finished");
        Ok(report)
    }

    /// Removes liked tracks that repeat an earlier `(name, artist)`.
    /// Returns how many duplicates were found.
    pub async fn dedup_liked_tracks(&self, snapshot: &mut Snapshot) -> Result<usize, SyncError> {
        if refresh_liked_tracks(&self.client, &self.settings, snapshot).await? {
            self.save(snapshot)?;
        }

        let duplicates = find_duplicates(&snapshot.last_liked_tracks);
        if duplicates.is_empty() {
            tracing::info!("No duplicate liked tracks");
            return Ok(0);
        }

        let (kept, removed) = split_out(&snapshot.last_liked_tracks, &duplicates);
        // removal is by id; an id that is also kept cannot be removed remotely
        let kept_ids: HashSet<&str> = kept.iter().map(Track::track_id).collect();
        let mut seen = HashSet::new();
        let ids: Vec<String> = removed
            .iter()
            .map(Track::track_id)
            .filter(|id| !kept_ids.contains(id) && seen.insert(*id))
            .map(str::to_string)
            .collect();

        tracing::info!(
            duplicates = duplicates.len(),
            removing = ids.len(),
            "Removing duplicate liked tracks"
        );
        self.remove_in_batches("remove saved tracks", &ids, |batch| {
            self.client.remove_saved_tracks(batch)
        })
        .await?;

        snapshot.last_liked_tracks = kept;
        self.save(snapshot)?;
        Ok(duplicates.len())
    }

    /// Removes repeated `(name, artist)` entries from every managed playlist.
    /// Returns how many duplicates were found across all playlists.
    pub async fn dedup_playlists(&self, snapshot: &mut Snapshot) -> Result<usize, SyncError> {
        let refreshed =
            refresh_playlist_tracks(&self.client, &self.settings, snapshot, RefreshMode::Full)
                .await?;
        if refreshed > 0 {
            self.save(snapshot)?;
        }

        let mut total = 0;
        for playlist_id in snapshot.playlists.ids().to_vec() {
            let tracks = snapshot.playlists.tracks(&playlist_id).to_vec();
            let duplicates = find_duplicates(&tracks);
            if duplicates.is_empty() {
                tracing::debug!(%playlist_id, "No duplicates in playlist");
                continue;
            }

            let (kept, removed) = split_out(&tracks, &duplicates);
            let uris = unique_uris(&removed);
            let removed_uris: HashSet<&str> = uris.iter().map(String::as_str).collect();
            // Removing a uri drops every occurrence, including a kept one.
            let (restored, untouched): (Vec<Track>, Vec<Track>) = kept
                .into_iter()
                .partition(|track| removed_uris.contains(track.uri.as_str()));

            tracing::info!(
                %playlist_id,
                duplicates = duplicates.len(),
                restored = restored.len(),
                "Removing duplicate playlist tracks"
            );
            self.remove_in_batches("remove playlist tracks", &uris, |batch| {
                self.client.remove_tracks_from_playlist(&playlist_id, batch)
            })
            .await?;

            let policy = self.settings.backoff();
            let restored_uris = unique_uris(&restored);
            for batch in restored_uris.chunks(self.settings.add_batch_size) {
                retry(policy, "restore playlist tracks", || {
                    self.client.add_tracks_to_playlist(&playlist_id, batch)
                })
                .await?;
            }

            let mut pruned = untouched;
            pruned.extend(restored);
            snapshot.playlists.replace_tracks(&playlist_id, pruned);
            self.save(snapshot)?;
            total += duplicates.len();
        }

        Ok(total)
    }

    /// Removes playlist tracks whose uri is liked. Returns how many were removed.
    pub async fn prune_liked_from_playlists(
        &self,
        snapshot: &mut Snapshot,
    ) -> Result<usize, SyncError> {
        let liked: HashSet<String> = snapshot
            .last_liked_tracks
            .iter()
            .map(|track| track.uri.clone())
            .collect();

        let mut total = 0;
        for playlist_id in snapshot.playlists.ids().to_vec() {
            let (liked_tracks, retained): (Vec<Track>, Vec<Track>) = snapshot
                .playlists
                .tracks(&playlist_id)
                .iter()
                .cloned()
                .partition(|track| liked.contains(&track.uri));
            if liked_tracks.is_empty() {
                continue;
            }

            let uris = unique_uris(&liked_tracks);
            tracing::info!(%playlist_id, removing = liked_tracks.len(), "Pruning liked tracks");
            self.remove_in_batches("prune liked tracks", &uris, |batch| {
                self.client.remove_tracks_from_playlist(&playlist_id, batch)
            })
            .await?;

            snapshot.playlists.replace_tracks(&playlist_id, retained);
            self.save(snapshot)?;
            total += liked_tracks.len();
        }

        Ok(total)
    }

    async fn remove_in_batches<'a, F, Fut>(
        &self,
        operation_name: &str,
        items: &'a [String],
        remove: F,
    ) -> Result<(), CatalogError>
    where
        F: Fn(&'a [String]) -> Fut,
        Fut: Future<Output = Result<(), CatalogError>>,
    {
        let policy = self.settings.backoff();
        for batch in items.chunks(self.settings.remove_batch_size) {
            retry(policy, operation_name, || remove(batch)).await?;
            tracing::debug!(operation = operation_name, batch = batch.len(), "Removed batch");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::catalog::CatalogTrack;
    use crate::test_utils::{FakeCatalog, MemorySnapshotStore, catalog_track, test_settings};

    fn liked_library() -> Vec<CatalogTrack> {
        (0..10)
            .map(|i| match i {
                7 => catalog_track("Song A", "Artist1", "spotify:track:a-reissue"),
                3 => catalog_track("Song A", "Artist1", "spotify:track:a"),
                _ => catalog_track(&format!("Song {i}"), "Artist1", &format!("spotify:track:{i}")),
            })
            .collect()
    }

    fn service_with(catalog: FakeCatalog) -> SyncService<FakeCatalog, MemorySnapshotStore> {
        SyncService::new(catalog, MemorySnapshotStore::default(), test_settings())
    }

    #[test]
    fn test_find_duplicates_reports_later_positions_only() {
        let tracks: Vec<Track> = liked_library().iter().map(Track::from_catalog).collect();
        assert_eq!(find_duplicates(&tracks), vec![7]);
    }

    #[test]
    fn test_find_duplicates_uses_name_and_artist() {
        let tracks = vec![
            Track::new("Intro", "A", "spotify:track:1"),
            Track::new("Intro", "B", "spotify:track:2"),
            Track::new("Intro", "A", "spotify:track:3"),
            Track::new("Intro", "A", "spotify:track:1"),
        ];
        assert_eq!(find_duplicates(&tracks), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_liked_dedup_removes_later_occurrence_and_is_idempotent() {
        let catalog = FakeCatalog::default();
        for (i, track) in liked_library().into_iter().enumerate() {
            catalog.like(track, 10_000 - i as i64);
        }
        let service = service_with(catalog);
        let mut snapshot = Snapshot::default();

        let found = service.dedup_liked_tracks(&mut snapshot).await.unwrap();

        assert_eq!(found, 1);
        assert_eq!(
            service.client.saved_removals(),
            vec![vec!["a-reissue".to_string()]]
        );
        assert_eq!(snapshot.last_liked_tracks.len(), 9);
        assert_eq!(snapshot.last_liked_tracks[3].uri, "spotify:track:a");
        assert!(
            !snapshot
                .last_liked_tracks
                .iter()
                .any(|track| track.uri == "spotify:track:a-reissue")
        );

        let found = service.dedup_liked_tracks(&mut snapshot).await.unwrap();
        assert_eq!(found, 0);
        assert_eq!(service.client.saved_removals().len(), 1);
    }

    #[tokio::test]
    async fn test_playlist_dedup_restores_kept_track_sharing_a_uri() {
        let catalog = FakeCatalog::default();
        catalog.put_playlist(
            "p1",
            vec![
                catalog_track("A", "X", "spotify:track:a"),
                catalog_track("B", "X", "spotify:track:b"),
                catalog_track("A", "X", "spotify:track:a"),
                // a different release of the same song
                catalog_track("A", "X", "spotify:track:a2"),
            ],
        );
        let service = service_with(catalog);
        let mut snapshot = Snapshot::with_playlists(["p1"]);

        let found = service.dedup_playlists(&mut snapshot).await.unwrap();

        assert_eq!(found, 2);
        assert_eq!(
            snapshot.playlists.tracks("p1"),
            [
                Track::new("B", "X", "spotify:track:b"),
                Track::new("A", "X", "spotify:track:a"),
            ]
        );
        assert_eq!(
            service.client.playlist_uris("p1"),
            vec!["spotify:track:b", "spotify:track:a"]
        );

        let found = service.dedup_playlists(&mut snapshot).await.unwrap();
        assert_eq!(found, 0);
    }

    #[tokio::test]
    async fn test_prune_matches_liked_by_uri_only() {
        let catalog = FakeCatalog::default();
        catalog.put_playlist(
            "p1",
            vec![
                catalog_track("Liked", "X", "spotify:track:liked"),
                // same name and artist as a liked track, but another uri
                catalog_track("Liked", "X", "spotify:track:remix"),
                catalog_track("Other", "X", "spotify:track:other"),
            ],
        );
        let service = service_with(catalog);

        let mut snapshot = Snapshot::with_playlists(["p1"]);
        snapshot.last_liked_tracks = vec![Track::new("Liked", "X", "spotify:track:liked")];
        refresh_playlist_tracks(
            &service.client,
            &service.settings,
            &mut snapshot,
            RefreshMode::Full,
        )
        .await
        .unwrap();

        let pruned = service.prune_liked_from_playlists(&mut snapshot).await.unwrap();

        assert_eq!(pruned, 1);
        assert_eq!(
            service.client.playlist_uris("p1"),
            vec!["spotify:track:remix", "spotify:track:other"]
        );
        assert_eq!(snapshot.playlists.track_count("p1"), 2);
    }

    #[tokio::test]
    async fn test_cleanup_runs_every_pass_and_persists() {
        let catalog = FakeCatalog::default();
        catalog.like(catalog_track("Liked", "X", "spotify:track:liked"), 1_000);
        catalog.put_playlist(
            "p1",
            vec![
                catalog_track("Liked", "X", "spotify:track:liked"),
                catalog_track("Kept", "X", "spotify:track:kept"),
                catalog_track("Kept", "X", "spotify:track:kept-2"),
            ],
        );
        let mut initial = Snapshot::with_playlists(["p1"]);
        initial.artists = vec!["Bicep".into(), "bicep".into(), "Floorplan".into()];

        let service = SyncService::new(catalog, MemorySnapshotStore::new(initial), test_settings());
        let report = service
            .cleanup(CleanupOptions { prune_liked: true })
            .await
            .unwrap();

        assert_eq!(
            report,
            CleanupReport {
                duplicate_artists: 1,
                liked_duplicates: 0,
                playlist_duplicates: 1,
                pruned_liked: 1,
            }
        );
        let saved = service.store().snapshot().unwrap();
        assert_eq!(saved.artists, vec!["Bicep", "Floorplan"]);
        assert_eq!(
            saved.playlists.tracks("p1"),
            [Track::new("Kept", "X", "spotify:track:kept")]
        );
        assert_eq!(service.client.playlist_uris("p1"), vec!["spotify:track:kept"]);
    }
}
