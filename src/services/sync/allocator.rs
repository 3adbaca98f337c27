use crate::config::SyncSettings;
use crate::ports::catalog::{CatalogError, MusicCatalog};
use crate::services::sync::backoff::{BackoffPolicy, retry};
use crate::services::sync::snapshot::PlaylistRegistry;

/// Where the next tracks go: a playlist and how many more tracks it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub playlist_id: String,
    pub room: usize,
}

/// Spreads tracks over the registry's playlists in order, creating a new
/// playlist whenever the last one is full.
#[derive(Debug)]
pub struct PlaylistAllocator {
    current_index: usize,
    capacity: usize,
    name_prefix: String,
    public: bool,
    policy: BackoffPolicy,
}

impl PlaylistAllocator {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            current_index: 0,
            capacity: settings.playlist_capacity.max(1),
            name_prefix: settings.playlist_name_prefix.clone(),
            public: settings.public_playlists,
            policy: settings.backoff(),
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Selects the playlist that receives the next tracks.
    ///
    /// Full playlists are passed over and a new one is created once the
    /// registry runs out. The returned slot always has room for at least one
    /// track; when it has less room than `needed`, the caller writes what fits
    /// and asks again for the rest.
    pub async fn ensure_capacity<C: MusicCatalog + ?Sized>(
        &mut self,
        client: &C,
        registry: &mut PlaylistRegistry,
        needed: usize,
    ) -> Result<Slot, CatalogError> {
        loop {
            let Some(playlist_id) = registry.get(self.current_index) else {
                self.create_playlist(client, registry).await?;
                continue;
            };

            let count = registry.track_count(playlist_id);
            if count >= self.capacity {
                tracing::info!(
                    playlist_id,
                    count,
                    capacity = self.capacity,
                    "Playlist is full, moving to the next one"
                );
                self.current_index += 1;
                continue;
            }

            let room = self.capacity - count;
            if room < needed {
                tracing::info!(
                    playlist_id,
                    room,
                    needed,
                    "Batch does not fit, it will spill into the next playlist"
                );
            }
            return Ok(Slot {
                playlist_id: playlist_id.to_string(),
                room,
            });
        }
    }

    async fn create_playlist<C: MusicCatalog + ?Sized>(
        &mut self,
        client: &C,
        registry: &mut PlaylistRegistry,
    ) -> Result<(), CatalogError> {
        let name = format!("{} {}", self.name_prefix, registry.len() + 1);
        tracing::info!(%name, "Reached the end of the managed playlists, creating a new one");

        let playlist_id = retry(self.policy, "create playlist", || {
            client.create_playlist(&name, self.public)
        })
        .await?;

        self.current_index = registry.append(playlist_id.clone());
        tracing::info!(%playlist_id, %name, "Created playlist");
        Ok(())
    }
}
