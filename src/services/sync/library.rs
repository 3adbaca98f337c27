use crate::config::SyncSettings;
use crate::ports::catalog::{CatalogError, MusicCatalog};
use crate::services::sync::change_detector::{
    PlaylistFreshness, liked_tracks_changed, playlist_freshness,
};
use crate::services::sync::paginate::{Pagination, fetch_all};
use crate::services::sync::snapshot::{Snapshot, Track, now_millis};

/// How a stale playlist is re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Re-read everything from the first page.
    Full,
    /// When the playlist only grew, keep the cached prefix and re-read from
    /// the page the cache ends in.
    Resume,
}

/// Brings the cached saved tracks up to date. Returns whether they were re-fetched.
pub async fn refresh_liked_tracks<C: MusicCatalog + ?Sized>(
    client: &C,
    settings: &SyncSettings,
    snapshot: &mut Snapshot,
) -> Result<bool, CatalogError> {
    let policy = settings.backoff();
    if !liked_tracks_changed(client, policy, snapshot).await? {
        tracing::info!(
            liked = snapshot.last_liked_tracks.len(),
            "Liked tracks have not changed since last update, using cached liked tracks"
        );
        return Ok(false);
    }

    tracing::info!("Fetching liked tracks");
    let started_at = now_millis();
    let items = fetch_all(
        Pagination::new(settings.page_size, settings.round_size, settings.liked_max_pages),
        policy,
        "fetch saved tracks",
        |offset, limit| client.saved_tracks_page(limit, offset),
    )
    .await?;

    snapshot.last_liked_tracks = items
        .iter()
        .filter_map(|item| item.track.as_ref())
        .map(Track::from_catalog)
        .collect();
    snapshot.last_updated = started_at;

    tracing::info!(liked = snapshot.last_liked_tracks.len(), "Fetched liked tracks");
    Ok(true)
}

/// Brings the cached contents of every managed playlist up to date.
/// Returns how many playlists were re-fetched.
pub async fn refresh_playlist_tracks<C: MusicCatalog + ?Sized>(
    client: &C,
    settings: &SyncSettings,
    snapshot: &mut Snapshot,
    mode: RefreshMode,
) -> Result<usize, CatalogError> {
    let policy = settings.backoff();
    let mut refreshed = 0;

    for playlist_id in snapshot.playlists.ids().to_vec() {
        let remote_count = match playlist_freshness(client, policy, snapshot, &playlist_id).await? {
            PlaylistFreshness::Unchanged => {
                tracing::info!(
                    %playlist_id,
                    "Playlist has not changed since last update, using cached tracks"
                );
                continue;
            }
            PlaylistFreshness::Changed { remote_count } => remote_count,
        };

        let cached = snapshot.playlists.tracks(&playlist_id);
        let start_page = match mode {
            RefreshMode::Resume if remote_count > cached.len() => {
                cached.len() as u32 / settings.page_size.max(1)
            }
            _ => 0,
        };
        let kept = (start_page * settings.page_size) as usize;
        let mut tracks = cached[..kept.min(cached.len())].to_vec();

        tracing::info!(%playlist_id, start_page, remote_count, "Fetching playlist tracks");
        let items = fetch_all(
            Pagination::new(
                settings.page_size,
                settings.round_size,
                settings.playlist_max_pages,
            )
            .starting_at(start_page),
            policy,
            "fetch playlist tracks",
            |offset, limit| client.playlist_tracks_page(&playlist_id, limit, offset),
        )
        .await?;

        tracks.extend(
            items
                .iter()
                .filter_map(|item| item.track.as_ref())
                .map(Track::from_catalog),
        );
        tracing::info!(%playlist_id, tracks = tracks.len(), "Fetched playlist tracks");
        snapshot.playlists.replace_tracks(&playlist_id, tracks);
        refreshed += 1;
    }

    Ok(refreshed)
}
