use crate::ports::catalog::{CatalogError, MusicCatalog};
use crate::services::sync::backoff::{BackoffPolicy, retry};
use crate::services::sync::snapshot::Snapshot;

/// Result of probing one playlist against its cached contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFreshness {
    Unchanged,
    Changed { remote_count: usize },
}

/// Whether the saved tracks must be re-fetched.
///
/// Probes the most recently added saved track only. Anything saved after the
/// snapshot's `last_updated` means the cached list is stale.
pub async fn liked_tracks_changed<C: MusicCatalog + ?Sized>(
    client: &C,
    policy: BackoffPolicy,
    snapshot: &Snapshot,
) -> Result<bool, CatalogError> {
    let newest = retry(policy, "probe saved tracks", || client.saved_tracks_page(1, 0)).await?;

    let changed = match newest.first() {
        Some(item) => item.added_at.timestamp_millis() > snapshot.last_updated,
        // The library is empty now; only a non-empty cache is out of date.
        None => !snapshot.last_liked_tracks.is_empty(),
    };

    tracing::debug!(
        changed,
        last_updated = snapshot.last_updated,
        "Checked saved tracks for changes"
    );
    Ok(changed)
}

/// Compares the remote track count of `playlist_id` with the cached list.
pub async fn playlist_freshness<C: MusicCatalog + ?Sized>(
    client: &C,
    policy: BackoffPolicy,
    snapshot: &Snapshot,
    playlist_id: &str,
) -> Result<PlaylistFreshness, CatalogError> {
    let info = retry(policy, "probe playlist", || client.playlist(playlist_id)).await?;
    let remote_count = info.track_count as usize;
    let cached_count = snapshot.playlists.track_count(playlist_id);

    tracing::debug!(
        playlist_id,
        remote_count,
        cached_count,
        "Checked playlist for changes"
    );

    if snapshot.playlists.contains(playlist_id) && remote_count == cached_count {
        Ok(PlaylistFreshness::Unchanged)
    } else {
        Ok(PlaylistFreshness::Changed { remote_count })
    }
}
