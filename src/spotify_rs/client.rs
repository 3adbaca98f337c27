use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::ports::catalog::{CatalogError, ErrorMessage};
use crate::spotify_rs::types::{
    ArtistObject, ArtistSearchResponse, CreatePlaylistRequest, CreatedPlaylist, Paging,
    PlaylistSummary, PlaylistTrackObject, SavedTrackObject, SimplifiedAlbum, SpotifyUser,
    TrackObject, TrackUri,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw Spotify Web API calls. Every call takes the access token to use.
pub struct SpotifyApi {
    client: Client,
    base_url: Url,
}

impl SpotifyApi {
    pub fn new(base_url: &str) -> color_eyre::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            color_eyre::eyre::bail!("API base url {base_url} cannot hold a path");
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `GET /me/tracks`, newest first
    pub async fn saved_tracks(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Paging<SavedTrackObject>, CatalogError> {
        let request = self
            .client
            .get(self.endpoint(&["me", "tracks"]))
            .query(&[("limit", limit), ("offset", offset)]);
        send_json(request, token).await
    }

    /// `DELETE /me/tracks`, at most 50 ids
    pub async fn remove_saved_tracks(&self, token: &str, ids: &[String]) -> Result<(), CatalogError> {
        let request = self
            .client
            .delete(self.endpoint(&["me", "tracks"]))
            .json(&json!({ "ids": ids }));
        send(request, token).await.map(drop)
    }

    /// Best match of `GET /search?type=artist`
    pub async fn search_artist(
        &self,
        token: &str,
        name: &str,
    ) -> Result<Option<ArtistObject>, CatalogError> {
        let request = self
            .client
            .get(self.endpoint(&["search"]))
            .query(&[("q", name), ("type", "artist"), ("limit", "1")]);
        let response: ArtistSearchResponse = send_json(request, token).await?;
        Ok(response.artists.items.into_iter().next())
    }

    /// `GET /artists/{id}/albums`
    pub async fn artist_albums(
        &self,
        token: &str,
        artist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Paging<SimplifiedAlbum>, CatalogError> {
        let request = self
            .client
            .get(self.endpoint(&["artists", artist_id, "albums"]))
            .query(&[("limit", limit), ("offset", offset)]);
        send_json(request, token).await
    }

    /// `GET /albums/{id}/tracks`
    pub async fn album_tracks(
        &self,
        token: &str,
        album_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Paging<TrackObject>, CatalogError> {
        let request = self
            .client
            .get(self.endpoint(&["albums", album_id, "tracks"]))
            .query(&[("limit", limit), ("offset", offset)]);
        send_json(request, token).await
    }

    /// `GET /playlists/{id}` trimmed to the track total
    pub async fn playlist(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<PlaylistSummary, CatalogError> {
        let request = self
            .client
            .get(self.endpoint(&["playlists", playlist_id]))
            .query(&[("fields", "id,tracks.total")]);
        send_json(request, token).await
    }

    /// `GET /playlists/{id}/tracks`
    pub async fn playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Paging<PlaylistTrackObject>, CatalogError> {
        let request = self
            .client
            .get(self.endpoint(&["playlists", playlist_id, "tracks"]))
            .query(&[("limit", limit), ("offset", offset)]);
        send_json(request, token).await
    }

    /// `POST /playlists/{id}/tracks`, at most 100 uris
    pub async fn add_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError> {
        let request = self
            .client
            .post(self.endpoint(&["playlists", playlist_id, "tracks"]))
            .json(&json!({ "uris": uris }));
        send(request, token).await.map(drop)
    }

    /// `DELETE /playlists/{id}/tracks`. Removes every occurrence of each uri.
    pub async fn remove_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), CatalogError> {
        let tracks: Vec<TrackUri> = uris.iter().map(|uri| TrackUri { uri }).collect();
        let request = self
            .client
            .delete(self.endpoint(&["playlists", playlist_id, "tracks"]))
            .json(&json!({ "tracks": tracks }));
        send(request, token).await.map(drop)
    }

    /// Get the current user's profile
    pub async fn current_user(&self, token: &str) -> Result<SpotifyUser, CatalogError> {
        send_json(self.client.get(self.endpoint(&["me"])), token).await
    }

    /// `POST /users/{id}/playlists`
    pub async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
        public: bool,
    ) -> Result<CreatedPlaylist, CatalogError> {
        let request = self
            .client
            .post(self.endpoint(&["users", user_id, "playlists"]))
            .json(&CreatePlaylistRequest {
                name,
                public,
                description: "",
            });
        send_json(request, token).await
    }
}

async fn send(request: RequestBuilder, token: &str) -> Result<Response, CatalogError> {
    let response = request
        .bearer_auth(token)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|e| CatalogError::transient(format!("request failed: {e}")))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status.as_u16(), retry_after, &body))
}

async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    token: &str,
) -> Result<T, CatalogError> {
    send(request, token)
        .await?
        .json::<T>()
        .await
        .map_err(|e| CatalogError::transient(format!("failed to decode response: {e}")))
}

/// Maps a failed response onto the catalog error taxonomy.
pub fn classify_error(status: u16, retry_after: Option<Duration>, body: &str) -> CatalogError {
    let message = error_message(body);
    match status {
        429 => CatalogError::RateLimited {
            message,
            retry_after,
        },
        500..=599 => CatalogError::Transient { message },
        _ => CatalogError::Rejected { status, message },
    }
}

/// Extracts the message of a Spotify error body.
///
/// Spotify sends `{"error": {"status": .., "message": ".."}}` for API errors,
/// `{"error": ".."}` for auth errors and plain text from some proxies.
pub fn error_message(body: &str) -> ErrorMessage {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        let text = body.trim();
        return if text.is_empty() {
            ErrorMessage::from("empty response body")
        } else {
            ErrorMessage::from(text)
        };
    };

    match value.get("error") {
        Some(serde_json::Value::String(text)) => ErrorMessage::from(text.as_str()),
        Some(error) => match error.get("message").and_then(|m| m.as_str()) {
            Some(text) => ErrorMessage::from(text),
            None => ErrorMessage::Structured(error.clone()),
        },
        None => ErrorMessage::Structured(value),
    }
}
