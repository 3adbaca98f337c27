use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Message payload attached to a failed catalog call.
///
/// Spotify answers some errors with a bare string and others with a JSON
/// object, so both shapes are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorMessage {
    Text(String),
    Structured(serde_json::Value),
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMessage::Text(text) => f.write_str(text),
            ErrorMessage::Structured(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        ErrorMessage::Text(text.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(text: String) -> Self {
        ErrorMessage::Text(text)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("rate limited: {message}")]
    RateLimited {
        message: ErrorMessage,
        retry_after: Option<Duration>,
    },
    #[error("remote request failed: {message}")]
    Transient { message: ErrorMessage },
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: ErrorMessage },
    #[error("no access token available")]
    TokenUnavailable,
}

impl CatalogError {
    pub fn transient(message: impl Into<ErrorMessage>) -> Self {
        CatalogError::Transient {
            message: message.into(),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, CatalogError::RateLimited { .. })
    }
}

/// A track as listed by the catalog (album listing, saved tracks, playlists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub name: String,
    pub uri: String,
    pub artists: Vec<String>,
}

/// One entry of the user's saved tracks. `track` is `None` for entries the
/// catalog no longer resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedTrack {
    pub added_at: DateTime<Utc>,
    pub track: Option<CatalogTrack>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItem {
    pub track: Option<CatalogTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogAlbum {
    pub id: String,
    pub name: String,
    pub total_tracks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: String,
    pub track_count: u32,
}

/// Port trait wrapping the music catalog capabilities the sync engine needs.
///
/// Implementations live in `services::spotify::client` (production) or test fakes.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MusicCatalog: Send + Sync {
    async fn saved_tracks_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SavedTrack>, CatalogError>;

    async fn remove_saved_tracks(&self, track_ids: &[String]) -> Result<(), CatalogError>;

    async fn search_artist(&self, name: &str) -> Result<Option<CatalogArtist>, CatalogError>;

    async fn artist_albums(
        &self,
        artist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CatalogAlbum>, CatalogError>;

    async fn album_tracks(
        &self,
        album_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CatalogTrack>, CatalogError>;

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo, CatalogError>;

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistItem>, CatalogError>;

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<(), CatalogError>;

    async fn remove_tracks_from_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<(), CatalogError>;

    async fn create_playlist(&self, name: &str, public: bool) -> Result<String, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_message_renders_as_json() {
        let message = ErrorMessage::Structured(serde_json::json!({"status": 429}));
        assert_eq!(message.to_string(), r#"{"status":429}"#);
    }

    #[test]
    fn test_text_message_renders_verbatim() {
        let err = CatalogError::RateLimited {
            message: "API rate limit exceeded".into(),
            retry_after: None,
        };
        assert_eq!(err.to_string(), "rate limited: API rate limit exceeded");
        assert!(err.is_rate_limit());
        assert!(!CatalogError::transient("boom").is_rate_limit());
    }
}
