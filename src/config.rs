use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::{Context, OptionExt};
use serde::{Deserialize, Serialize};

use crate::services::sync::backoff::BackoffPolicy;

const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_snapshot")]
    snapshot: String,
    #[serde(default)]
    token_file: Option<String>,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Tunables of the sync engine. Defaults match what the Spotify Web API allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Items per page request.
    pub page_size: u32,
    /// Parallel page requests per round when listing saved or playlist tracks.
    pub round_size: u32,
    /// Page cap for the saved tracks scan.
    pub liked_max_pages: u32,
    /// Page cap for a playlist scan.
    pub playlist_max_pages: u32,
    /// Page cap for an artist's album listing.
    pub album_max_pages: u32,
    /// Albums whose tracks are fetched together.
    pub album_chunk_size: usize,
    /// Track page requests in flight at once for one album chunk.
    pub album_track_concurrency: usize,
    /// Track pages read per album.
    pub album_track_max_pages: u32,
    pub add_batch_size: usize,
    pub remove_batch_size: usize,
    /// Tracks a managed playlist may hold.
    pub playlist_capacity: usize,
    pub playlist_name_prefix: String,
    pub public_playlists: bool,
    /// Wait after the first failure of a remote call; doubles per failure.
    pub backoff_unit_ms: u64,
    pub token_poll_interval_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            round_size: 10,
            liked_max_pages: 300,
            playlist_max_pages: 250,
            album_max_pages: 50,
            album_chunk_size: 10,
            album_track_concurrency: 20,
            album_track_max_pages: 20,
            add_batch_size: 100,
            remove_batch_size: 50,
            playlist_capacity: 8000,
            playlist_name_prefix: "Discover House".to_string(),
            public_playlists: false,
            backoff_unit_ms: 1000,
            token_poll_interval_ms: 100,
        }
    }
}

impl SyncSettings {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(self.backoff_unit_ms))
    }

    pub fn token_poll_interval(&self) -> Duration {
        Duration::from_millis(self.token_poll_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        let positive = [
            ("page_size", self.page_size as usize),
            ("round_size", self.round_size as usize),
            ("album_chunk_size", self.album_chunk_size),
            ("album_track_concurrency", self.album_track_concurrency),
            ("add_batch_size", self.add_batch_size),
            ("remove_batch_size", self.remove_batch_size),
            ("playlist_capacity", self.playlist_capacity),
        ];
        for (name, value) in positive {
            if value == 0 {
                color_eyre::eyre::bail!("sync.{name} must be greater than 0");
            }
        }
        Ok(())
    }
}

fn default_snapshot() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("discover-sync").join("snapshot.json"))
        .unwrap_or_else(|| PathBuf::from("snapshot.json"))
        .to_string_lossy()
        .to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot(),
            token_file: None,
            api_base_url: default_api_base_url(),
            sync: SyncSettings::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Default config file location
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("discover-sync").join("config.toml"))
    }

    /// Load the default config file, or built-in defaults when there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config file unless one already exists
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("Could not determine config directory")?;
        if path.exists() {
            tracing::info!("Config already exists at {}", path.display());
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(&Self::default())
            .wrap_err("Failed to serialize default config")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(path)
    }

    /// Expand ~ to home directory
    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        Self::expand_path(&self.snapshot)
    }

    pub fn token_file_path(&self) -> Option<PathBuf> {
        self.token_file.as_deref().map(Self::expand_path)
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}
