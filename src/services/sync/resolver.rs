use std::collections::HashSet;

use futures::{StreamExt, TryStreamExt, stream};

use crate::config::SyncSettings;
use crate::ports::catalog::{CatalogAlbum, CatalogArtist, CatalogError, MusicCatalog};
use crate::services::sync::backoff::retry;
use crate::services::sync::paginate::{Pagination, fetch_all};
use crate::services::sync::snapshot::{ArtistResult, PlaylistRegistry, Track, now_millis};

/// Tracks by one artist that are neither liked nor in a managed playlist,
/// plus the partially filled result record for that artist.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtist {
    pub tracks: Vec<Track>,
    pub result: ArtistResult,
}

/// Lists every track of `artist` and keeps the ones worth adding.
///
/// Tracks are credited to `artist.name` and deduplicated by name only,
/// first one wins. Anything already liked or already in any managed
/// playlist (by uri) is dropped.
#[tracing::instrument(skip_all, fields(artist = %artist.name))]
pub async fn resolve_artist_tracks<C: MusicCatalog + ?Sized>(
    client: &C,
    settings: &SyncSettings,
    artist: &CatalogArtist,
    liked: &[Track],
    playlists: &PlaylistRegistry,
) -> Result<ResolvedArtist, CatalogError> {
    let albums = fetch_all(
        Pagination::new(settings.page_size, 1, settings.album_max_pages),
        settings.backoff(),
        "fetch artist albums",
        |offset, limit| client.artist_albums(&artist.id, limit, offset),
    )
    .await?;
    tracing::info!(albums = albums.len(), "Fetched albums");

    let all_tracks = album_tracks(client, settings, artist, &albums).await?;
    let total = all_tracks.len();

    let mut seen_names = HashSet::new();
    let unique: Vec<Track> = all_tracks
        .into_iter()
        .filter(|track| seen_names.insert(track.name.clone()))
        .collect();
    let unique_count = unique.len();

    let liked_uris: HashSet<&str> = liked.iter().map(|track| track.uri.as_str()).collect();
    let playlist_uris = playlists.uris();
    let tracks: Vec<Track> = unique
        .into_iter()
        .filter(|track| !liked_uris.contains(track.uri.as_str()))
        .filter(|track| !playlist_uris.contains(track.uri.as_str()))
        .collect();

    tracing::info!(
        total,
        unique = unique_count,
        new = tracks.len(),
        "Resolved tracks not yet liked or added"
    );

    let result = ArtistResult {
        skipped: false,
        added_songs: 0,
        skipped_songs: (total - tracks.len()) as u32,
        last_updated: now_millis(),
    };
    Ok(ResolvedArtist { tracks, result })
}

/// Fetches the track listing of every album, `album_chunk_size` albums at a
/// time. A failed chunk is fetched again as a whole; earlier chunks are kept.
async fn album_tracks<C: MusicCatalog + ?Sized>(
    client: &C,
    settings: &SyncSettings,
    artist: &CatalogArtist,
    albums: &[CatalogAlbum],
) -> Result<Vec<Track>, CatalogError> {
    let page_size = settings.page_size;
    let mut tracks = Vec::new();

    for (chunk_index, chunk) in albums.chunks(settings.album_chunk_size).enumerate() {
        let requests: Vec<(&str, u32)> = chunk
            .iter()
            .flat_map(|album| {
                let pages = album
                    .total_tracks
                    .div_ceil(page_size)
                    .min(settings.album_track_max_pages);
                (0..pages).map(move |page| (album.id.as_str(), page * page_size))
            })
            .collect();

        let first_album = chunk_index * settings.album_chunk_size;
        tracing::debug!(
            from = first_album + 1,
            to = first_album + chunk.len(),
            of = albums.len(),
            pages = requests.len(),
            "Fetching album tracks"
        );

        let pages: Vec<_> = retry(settings.backoff(), "fetch album tracks", || {
            stream::iter(
                requests
                    .iter()
                    .map(|(album_id, offset)| client.album_tracks(album_id, page_size, *offset)),
            )
            .buffered(settings.album_track_concurrency)
            .try_collect::<Vec<_>>()
        })
        .await?;

        tracks.extend(
            pages
                .iter()
                .flatten()
                .map(|track| Track::credited_to(track, &artist.name)),
        );
    }

    Ok(tracks)
}
