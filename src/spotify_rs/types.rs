use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Spotify paging envelope. Only the fields the sync needs are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u32>,
}

/// Entry of `GET /me/tracks`
#[derive(Debug, Clone, Deserialize)]
pub struct SavedTrackObject {
    pub added_at: DateTime<Utc>,
    pub track: Option<TrackObject>,
}

/// Entry of `GET /playlists/{id}/tracks`. `track` is null for removed or
/// unavailable items.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTrackObject {
    #[serde(default)]
    pub track: Option<TrackObject>,
}

/// Full or simplified track; both carry the fields used here.
/// Episodes and local files may come without artists.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub id: String,
    pub name: String,
}

/// `GET /search?type=artist`
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistSearchResponse {
    pub artists: Paging<ArtistObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub total_tracks: u32,
}

/// `GET /playlists/{id}?fields=id,tracks.total`
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub tracks: PlaylistTracksRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracksRef {
    pub total: u32,
}

/// Spotify user profile
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub public: bool,
    pub description: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPlaylist {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackUri<'a> {
    pub uri: &'a str,
}
