use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{TimeZone, Utc};

use crate::config::SyncSettings;
use crate::ports::catalog::{
    CatalogAlbum, CatalogArtist, CatalogError, CatalogTrack, MusicCatalog, PlaylistInfo,
    PlaylistItem, SavedTrack,
};
use crate::services::sync::snapshot::Snapshot;
use crate::services::sync::store::{SnapshotStore, StoreError};

/// Default settings without any backoff sleeping.
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        backoff_unit_ms: 0,
        token_poll_interval_ms: 0,
        ..SyncSettings::default()
    }
}

pub fn catalog_track(name: &str, artist: &str, uri: &str) -> CatalogTrack {
    CatalogTrack {
        name: name.to_string(),
        uri: uri.to_string(),
        artists: vec![artist.to_string()],
    }
}

fn page<T: Clone>(items: &[T], limit: u32, offset: u32) -> Vec<T> {
    items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

fn not_found(what: &str) -> CatalogError {
    CatalogError::Rejected {
        status: 404,
        message: format!("{what} not found").into(),
    }
}

#[derive(Default)]
struct CatalogState {
    liked: Vec<SavedTrack>,
    playlists: HashMap<String, Vec<CatalogTrack>>,
    artists: Vec<CatalogArtist>,
    albums: HashMap<String, Vec<CatalogAlbum>>,
    album_tracks: HashMap<String, Vec<CatalogTrack>>,
    created: Vec<String>,
    saved_page_requests: Vec<(u32, u32)>,
    playlist_page_requests: HashMap<String, Vec<(u32, u32)>>,
    album_track_requests: HashMap<String, Vec<u32>>,
    adds: Vec<(String, usize)>,
    saved_removals: Vec<Vec<String>>,
    failures: HashMap<&'static str, usize>,
    calls: usize,
}

/// In-memory catalog that behaves like the remote for multi-step scenarios.
///
/// Every call is counted. `fail_next` makes the next calls of one method
/// fail with a rate limit error before touching any state.
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
}

impl FakeCatalog {
    fn begin(&self, method: &'static str) -> Result<MutexGuard<'_, CatalogState>, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if let Some(remaining) = state.failures.get_mut(method)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(CatalogError::RateLimited {
                message: format!("{method} rate limited").into(),
                retry_after: None,
            });
        }
        Ok(state)
    }

    /// Saves a track at `added_at` (epoch millis). Saved tracks list newest first.
    pub fn like(&self, track: CatalogTrack, added_at: i64) {
        let mut state = self.state.lock().unwrap();
        state.liked.push(SavedTrack {
            added_at: Utc.timestamp_millis_opt(added_at).unwrap(),
            track: Some(track),
        });
        state.liked.sort_by(|a, b| b.added_at.cmp(&a.added_at));
    }

    pub fn put_playlist(&self, playlist_id: &str, tracks: Vec<CatalogTrack>) {
        let mut state = self.state.lock().unwrap();
        state.playlists.insert(playlist_id.to_string(), tracks);
    }

    pub fn add_artist(&self, artist: &CatalogArtist) {
        self.state.lock().unwrap().artists.push(artist.clone());
    }

    pub fn add_album(&self, artist_id: &str, album_id: &str, tracks: Vec<CatalogTrack>) {
        let mut state = self.state.lock().unwrap();
        state
            .albums
            .entry(artist_id.to_string())
            .or_default()
            .push(CatalogAlbum {
                id: album_id.to_string(),
                name: album_id.to_string(),
                total_tracks: tracks.len() as u32,
            });
        state.album_tracks.insert(album_id.to_string(), tracks);
    }

    pub fn fail_next(&self, method: &'static str, times: usize) {
        self.state.lock().unwrap().failures.insert(method, times);
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn saved_page_requests(&self) -> Vec<(u32, u32)> {
        self.state.lock().unwrap().saved_page_requests.clone()
    }

    pub fn playlist_page_requests(&self, playlist_id: &str) -> Vec<(u32, u32)> {
        let state = self.state.lock().unwrap();
        state
            .playlist_page_requests
            .get(playlist_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Offsets requested for an album's tracks, sorted.
    pub fn album_track_requests(&self, album_id: &str) -> Vec<u32> {
        let state = self.state.lock().unwrap();
        let mut offsets = state
            .album_track_requests
            .get(album_id)
            .cloned()
            .unwrap_or_default();
        offsets.sort_unstable();
        offsets
    }

    /// Successful playlist writes as `(playlist id, batch size)`.
    pub fn add_calls(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().adds.clone()
    }

    pub fn saved_removals(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().saved_removals.clone()
    }

    pub fn created_playlists(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn playlist_len(&self, playlist_id: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.playlists.get(playlist_id).map_or(0, Vec::len)
    }

    pub fn playlist_uris(&self, playlist_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .playlists
            .get(playlist_id)
            .map(|tracks| tracks.iter().map(|track| track.uri.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MusicCatalog for FakeCatalog {
    async fn saved_tracks_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SavedTrack>, CatalogError> {
        let mut state = self.begin("saved_tracks_page")?;
        state.saved_page_requests.push((limit, offset));
        Ok(page(&state.liked, limit, offset))
    }

    async fn remove_saved_tracks(&self, track_ids: &[String]) -> Result<(), CatalogError> {
        let mut state = self.begin("remove_saved_tracks")?;
        state.liked.retain(|item| {
            item.track.as_ref().is_none_or(|track| {
                let id = track.uri.rsplit(':').next().unwrap_or(&track.uri);
                !track_ids.iter().any(|removed| removed == id)
            })
        });
        state.saved_removals.push(track_ids.to_vec());
        Ok(())
    }

    async fn search_artist(&self, name: &str) -> Result<Option<CatalogArtist>, CatalogError> {
        let state = self.begin("search_artist")?;
        Ok(state
            .artists
            .iter()
            .find(|artist| artist.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn artist_albums(
        &self,
        artist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CatalogAlbum>, CatalogError> {
        let state = self.begin("artist_albums")?;
        let albums = state.albums.get(artist_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(page(albums, limit, offset))
    }

    async fn album_tracks(
        &self,
        album_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        let mut state = self.begin("album_tracks")?;
        state
            .album_track_requests
            .entry(album_id.to_string())
            .or_default()
            .push(offset);
        let tracks = state
            .album_tracks
            .get(album_id)
            .ok_or_else(|| not_found("album"))?;
        Ok(page(tracks, limit, offset))
    }

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo, CatalogError> {
        let state = self.begin("playlist")?;
        let tracks = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| not_found("playlist"))?;
        Ok(PlaylistInfo {
            id: playlist_id.to_string(),
            track_count: tracks.len() as u32,
        })
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistItem>, CatalogError> {
        let mut state = self.begin("playlist_tracks_page")?;
        state
            .playlist_page_requests
            .entry(playlist_id.to_string())
            .or_default()
            .push((limit, offset));
        let tracks = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| not_found("playlist"))?;
        Ok(page(tracks, limit, offset)
            .into_iter()
            .map(|track| PlaylistItem { track: Some(track) })
            .collect())
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<(), CatalogError> {
        let mut state = self.begin("add_tracks_to_playlist")?;
        let known: HashMap<String, CatalogTrack> = state
            .album_tracks
            .values()
            .chain(state.playlists.values())
            .flatten()
            .chain(state.liked.iter().filter_map(|item| item.track.as_ref()))
            .map(|track| (track.uri.clone(), track.clone()))
            .collect();
        let tracks = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| not_found("playlist"))?;
        tracks.extend(track_uris.iter().map(|uri| {
            known
                .get(uri)
                .cloned()
                .unwrap_or_else(|| catalog_track(uri, "", uri))
        }));
        state.adds.push((playlist_id.to_string(), track_uris.len()));
        Ok(())
    }

    async fn remove_tracks_from_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<(), CatalogError> {
        let mut state = self.begin("remove_tracks_from_playlist")?;
        let tracks = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| not_found("playlist"))?;
        tracks.retain(|track| !track_uris.contains(&track.uri));
        Ok(())
    }

    async fn create_playlist(&self, name: &str, _public: bool) -> Result<String, CatalogError> {
        let mut state = self.begin("create_playlist")?;
        state.created.push(name.to_string());
        let playlist_id = format!("created-{}", state.created.len());
        state.playlists.insert(playlist_id.clone(), Vec::new());
        Ok(playlist_id)
    }
}

/// Snapshot store kept in memory. An empty store fails `load` like a missing file.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<Snapshot>>,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::Unavailable {
                path: "memory".into(),
                source: std::io::ErrorKind::NotFound.into(),
            })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
