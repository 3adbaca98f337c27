use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::ports::catalog::{
    CatalogAlbum, CatalogArtist, CatalogError, CatalogTrack, MusicCatalog, PlaylistInfo,
    PlaylistItem, SavedTrack,
};
use crate::ports::token::TokenSource;
use crate::spotify_rs::client::SpotifyApi;
use crate::spotify_rs::types::{SimplifiedAlbum, TrackObject};

/// Production [`MusicCatalog`] backed by the Spotify Web API.
///
/// The token is fetched from the [`TokenSource`] on every call so a refreshed
/// token is picked up without restarting.
pub struct SpotifyHttpAdapter {
    api: SpotifyApi,
    token: Arc<dyn TokenSource>,
    user_id: OnceCell<String>,
}

impl SpotifyHttpAdapter {
    pub fn new(api: SpotifyApi, token: Arc<dyn TokenSource>) -> Self {
        Self {
            api,
            token,
            user_id: OnceCell::new(),
        }
    }

    fn token(&self) -> Result<String, CatalogError> {
        self.token
            .access_token()
            .ok_or(CatalogError::TokenUnavailable)
    }

    async fn user_id(&self, token: &str) -> Result<&str, CatalogError> {
        let user_id = self
            .user_id
            .get_or_try_init(|| async {
                let user = self.api.current_user(token).await?;
                tracing::debug!(user_id = %user.id, name = ?user.display_name, "Resolved current user");
                Ok::<_, CatalogError>(user.id)
            })
            .await?;
        Ok(user_id.as_str())
    }
}

fn to_catalog_track(track: TrackObject) -> CatalogTrack {
    CatalogTrack {
        name: track.name,
        uri: track.uri,
        artists: track.artists.into_iter().map(|artist| artist.name).collect(),
    }
}

fn to_catalog_album(album: SimplifiedAlbum) -> CatalogAlbum {
    CatalogAlbum {
        id: album.id,
        name: album.name,
        total_tracks: album.total_tracks,
    }
}

#[async_trait::async_trait]
impl MusicCatalog for SpotifyHttpAdapter {
    async fn saved_tracks_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SavedTrack>, CatalogError> {
        let page = self.api.saved_tracks(&self.token()?, limit, offset).await?;
        Ok(page
            .items
            .into_iter()
            .map(|item| SavedTrack {
                added_at: item.added_at,
                track: item.track.map(to_catalog_track),
            })
            .collect())
    }

    async fn remove_saved_tracks(&self, track_ids: &[String]) -> Result<(), CatalogError> {
        self.api.remove_saved_tracks(&self.token()?, track_ids).await
    }

    async fn search_artist(&self, name: &str) -> Result<Option<CatalogArtist>, CatalogError> {
        let artist = self.api.search_artist(&self.token()?, name).await?;
        Ok(artist.map(|artist| CatalogArtist {
            id: artist.id,
            name: artist.name,
        }))
    }

    async fn artist_albums(
        &self,
        artist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CatalogAlbum>, CatalogError> {
        let page = self
            .api
            .artist_albums(&self.token()?, artist_id, limit, offset)
            .await?;
        Ok(page.items.into_iter().map(to_catalog_album).collect())
    }

    async fn album_tracks(
        &self,
        album_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CatalogTrack>, CatalogError> {
        let page = self
            .api
            .album_tracks(&self.token()?, album_id, limit, offset)
            .await?;
        Ok(page.items.into_iter().map(to_catalog_track).collect())
    }

    async fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo, CatalogError> {
        let summary = self.api.playlist(&self.token()?, playlist_id).await?;
        Ok(PlaylistInfo {
            id: summary.id,
            track_count: summary.tracks.total,
        })
    }

    async fn playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistItem>, CatalogError> {
        let page = self
            .api
            .playlist_tracks(&self.token()?, playlist_id, limit, offset)
            .await?;
        Ok(page
            .items
            .into_iter()
            .map(|item| PlaylistItem {
                track: item.track.map(to_catalog_track),
            })
            .collect())
    }

    async fn add_tracks_to_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<(), CatalogError> {
        self.api
            .add_tracks(&self.token()?, playlist_id, track_uris)
            .await
    }

    async fn remove_tracks_from_playlist(
        &self,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<(), CatalogError> {
        self.api
            .remove_tracks(&self.token()?, playlist_id, track_uris)
            .await
    }

    async fn create_playlist(&self, name: &str, public: bool) -> Result<String, CatalogError> {
        let token = self.token()?;
        let user_id = self.user_id(&token).await?;
        let created = self
            .api
            .create_playlist(&token, user_id, name, public)
            .await?;
        Ok(created.id)
    }
}
