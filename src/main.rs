mod config;
mod logging;
mod ports;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, bail},
};

use crate::{
    config::Config,
    ports::token::TokenSource,
    services::{
        spotify::client::SpotifyHttpAdapter,
        sync::{
            SyncService,
            artists::{add_artists, parse_artist_list},
            dedup::CleanupOptions,
            snapshot::{Snapshot, now_millis},
            store::{JsonSnapshotStore, SnapshotStore},
        },
        token::{StaticToken, TokenFile, wait_for_token},
    },
    spotify_rs::client::SpotifyApi,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "DISCOVER_SYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `discover_sync=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Export spans to this OTLP (gRPC) endpoint
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Spotify access token
    #[arg(long, global = true, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// File holding the current Spotify access token, re-read on every request
    #[arg(long, global = true, env = "SPOTIFY_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add new tracks of every listed artist to the managed playlists
    Sync,
    /// Remove duplicate artists, liked tracks and playlist tracks
    Cleanup {
        /// Also remove playlist tracks that are already liked
        #[arg(long)]
        prune_liked: bool,
    },
    /// Show per-artist results and playlist fill levels
    Status,
    #[command(subcommand)]
    Artists(ArtistCommands),
    #[command(subcommand)]
    Snapshot(SnapshotCommands),
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ArtistCommands {
    /// Append artists to the artist list
    Add {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Append every artist of a file, one name per line
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum SnapshotCommands {
    /// Create an empty snapshot, if it doesn't exist
    Init {
        /// Existing playlist to manage, in fill order
        #[arg(long = "playlist")]
        playlists: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = logging::init_tracing(args.otlp_endpoint.as_deref(), &args.log_level)?;

    let result = run(args).await;
    logging::shutdown_tracing(tracer_provider);
    result
}

async fn run(args: Args) -> Result<()> {
    tracing::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load discover-sync config")?;

    let store = JsonSnapshotStore::new(config.snapshot_path());
    tracing::debug!(snapshot = %store.path().display(), "Using snapshot");

    match args.command {
        Commands::Sync => {
            let token = token_source(args.access_token, args.token_file, &config)?;
            let service = sync_service(&config, token, store).await?;
            let report = service.sync().await?;
            println!(
                "Processed {} artists ({} skipped, {} not found), added {} tracks",
                report.processed, report.skipped, report.not_found, report.added
            );
        }
        Commands::Cleanup { prune_liked } => {
            let token = token_source(args.access_token, args.token_file, &config)?;
            let service = sync_service(&config, token, store).await?;
            let report = service.cleanup(CleanupOptions { prune_liked }).await?;
            println!(
                "Removed {} duplicate artists, {} duplicate liked tracks, {} duplicate playlist tracks, {} liked tracks from playlists",
                report.duplicate_artists,
                report.liked_duplicates,
                report.playlist_duplicates,
                report.pruned_liked
            );
        }
        Commands::Status => {
            let snapshot = store.load()?;
            print_status(&snapshot, config.sync.playlist_capacity);
        }
        Commands::Artists(command) => {
            let mut snapshot = store
                .load()
                .wrap_err("Run `discover-sync snapshot init` to create a snapshot first")?;
            let names = match command {
                ArtistCommands::Add { names } => names,
                ArtistCommands::Import { file } => {
                    let contents = std::fs::read_to_string(&file).with_context(|| {
                        format!("Failed to read artist list: {}", file.display())
                    })?;
                    parse_artist_list(&contents)
                }
            };
            let added = add_artists(&mut snapshot, &names);
            store.save(&snapshot)?;
            tracing::info!(added = added.len(), total = snapshot.artists.len(), "Updated artist list");
            for name in added {
                println!("Added {name}");
            }
        }
        Commands::Snapshot(SnapshotCommands::Init { playlists }) => {
            if store.exists() {
                bail!("Snapshot already exists at {}", store.path().display());
            }
            let snapshot = Snapshot::with_playlists(playlists);
            store.save(&snapshot)?;
            println!("Created snapshot at {}", store.path().display());
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                tracing::debug!("Creating default config");
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

/// Picks the token source: an explicit token, then a token file from the
/// command line, then the one from the config file.
fn token_source(
    access_token: Option<String>,
    token_file: Option<PathBuf>,
    config: &Config,
) -> Result<Arc<dyn TokenSource>> {
    if access_token.is_some() {
        return Ok(Arc::new(StaticToken::new(access_token)));
    }
    match token_file.or_else(|| config.token_file_path()) {
        Some(path) => Ok(Arc::new(TokenFile::new(path))),
        None => bail!(
            "No Spotify access token configured. Set SPOTIFY_ACCESS_TOKEN, --token-file or `token_file` in the config"
        ),
    }
}

async fn sync_service(
    config: &Config,
    token: Arc<dyn TokenSource>,
    store: JsonSnapshotStore,
) -> Result<SyncService<SpotifyHttpAdapter, JsonSnapshotStore>> {
    wait_for_token(token.as_ref(), config.sync.token_poll_interval()).await;
    let api = SpotifyApi::new(config.api_base_url())
        .with_context(|| format!("Invalid api_base_url: {}", config.api_base_url()))?;
    Ok(SyncService::new(
        SpotifyHttpAdapter::new(api, token),
        store,
        config.sync.clone(),
    ))
}

fn print_status(snapshot: &Snapshot, capacity: usize) {
    let format_time = |millis: i64| {
        chrono::DateTime::from_timestamp_millis(millis)
            .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string())
    };

    println!(
        "Liked tracks: {} (checked {})",
        snapshot.last_liked_tracks.len(),
        if snapshot.last_updated > 0 {
            format_time(snapshot.last_updated)
        } else {
            "never".to_string()
        }
    );

    println!("Playlists:");
    for (index, id) in snapshot.playlists.ids().iter().enumerate() {
        println!(
            "  {:>2}. {id}  {}/{capacity}",
            index + 1,
            snapshot.playlists.track_count(id)
        );
    }

    let now = now_millis();
    println!("Artists:");
    for name in &snapshot.artists {
        match snapshot.results.get(name) {
            Some(result) => println!(
                "  {name}: added {}, skipped {}{} ({}, {} ago)",
                result.added_songs,
                result.skipped_songs,
                if result.skipped { ", done" } else { "" },
                format_time(result.last_updated),
                humantime::format_duration(std::time::Duration::from_secs(
                    (now - result.last_updated).max(0) as u64 / 1000
                )),
            ),
            None => println!("  {name}: pending"),
        }
    }
}
