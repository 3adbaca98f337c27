use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ports::catalog::CatalogTrack;

/// Current wall clock in epoch milliseconds, the unit every snapshot timestamp uses.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A track as remembered by the snapshot.
///
/// `uri` decides whether a track is already liked or already in a playlist.
/// `(name, artist)` is the looser key the deduplication passes use, so two
/// remixes sharing a title and artist count as duplicates there but not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub artist: String,
    pub uri: String,
}

impl Track {
    pub fn new(name: impl Into<String>, artist: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            uri: uri.into(),
        }
    }

    /// Credits the track to its first listed artist.
    pub fn from_catalog(track: &CatalogTrack) -> Self {
        let artist = track.artists.first().cloned().unwrap_or_default();
        Self::new(track.name.clone(), artist, track.uri.clone())
    }

    /// Credits the track to `artist` regardless of the listed artists, so
    /// features and collaborations land under the artist being synced.
    pub fn credited_to(track: &CatalogTrack, artist: &str) -> Self {
        Self::new(track.name.clone(), artist, track.uri.clone())
    }

    /// The bare id at the end of a `spotify:track:<id>` uri.
    pub fn track_id(&self) -> &str {
        self.uri.rsplit(':').next().unwrap_or(&self.uri)
    }

    pub fn identity(&self) -> (&str, &str) {
        (&self.name, &self.artist)
    }
}

/// Outcome of syncing one artist. Once recorded it is never cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistResult {
    pub skipped: bool,
    pub added_songs: u32,
    pub skipped_songs: u32,
    pub last_updated: i64,
}

/// Managed playlists in fill order, with the last known contents of each.
///
/// Ids are only ever appended. Every id owns exactly one track list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRegistry {
    playlist_ids: Vec<String>,
    #[serde(rename = "lastPlaylistTracks")]
    tracks: BTreeMap<String, Vec<Track>>,
}

impl PlaylistRegistry {
    pub fn ids(&self) -> &[String] {
        &self.playlist_ids
    }

    pub fn len(&self) -> usize {
        self.playlist_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist_ids.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.playlist_ids.get(index).map(String::as_str)
    }

    pub fn contains(&self, playlist_id: &str) -> bool {
        self.tracks.contains_key(playlist_id)
    }

    /// Registers a playlist with an empty track list and returns its index.
    /// Appending a known id is a no-op that returns the existing index.
    pub fn append(&mut self, playlist_id: impl Into<String>) -> usize {
        let playlist_id = playlist_id.into();
        if let Some(index) = self.playlist_ids.iter().position(|id| *id == playlist_id) {
            return index;
        }
        self.tracks.insert(playlist_id.clone(), Vec::new());
        self.playlist_ids.push(playlist_id);
        self.playlist_ids.len() - 1
    }

    pub fn tracks(&self, playlist_id: &str) -> &[Track] {
        self.tracks.get(playlist_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn track_count(&self, playlist_id: &str) -> usize {
        self.tracks(playlist_id).len()
    }

    /// Records tracks that were just written to the remote playlist.
    pub fn record_appended(&mut self, playlist_id: &str, appended: &[Track]) {
        if let Some(tracks) = self.tracks.get_mut(playlist_id) {
            tracks.extend_from_slice(appended);
        }
    }

    /// Replaces the cached contents of a registered playlist.
    pub fn replace_tracks(&mut self, playlist_id: &str, replacement: Vec<Track>) {
        if let Some(tracks) = self.tracks.get_mut(playlist_id) {
            *tracks = replacement;
        }
    }

    /// Uris present in any managed playlist.
    pub fn uris(&self) -> HashSet<&str> {
        self.tracks
            .values()
            .flatten()
            .map(|track| track.uri.as_str())
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for id in &self.playlist_ids {
            if !seen.insert(id.as_str()) {
                return Err(format!("playlist {id} is registered twice"));
            }
            if !self.tracks.contains_key(id) {
                return Err(format!("playlist {id} has no track list"));
            }
        }
        if let Some(orphan) = self.tracks.keys().find(|id| !seen.contains(id.as_str())) {
            return Err(format!("track list for unregistered playlist {orphan}"));
        }
        Ok(())
    }
}

/// The whole durable state, always written and read as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub last_updated: i64,
    pub artists: Vec<String>,
    pub last_liked_tracks: Vec<Track>,
    #[serde(flatten)]
    pub playlists: PlaylistRegistry,
    #[serde(default)]
    pub results: BTreeMap<String, ArtistResult>,
}

impl Snapshot {
    pub fn with_playlists<I, S>(playlist_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut snapshot = Snapshot::default();
        for id in playlist_ids {
            snapshot.playlists.append(id);
        }
        snapshot
    }

    pub fn validate(&self) -> Result<(), String> {
        self.playlists.validate()
    }
}
