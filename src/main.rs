use anyhow::{Context, Result};
use cdn_player::cache::{AssetCacheManager, ReqwestFetcher};
use cdn_player::catalog::Catalog;
use cdn_player::clock::SystemClock;
use cdn_player::config::{CacheConfig, EngineConfig};
use cdn_player::engine::{FailedUrlRegistry, FallbackEngine, SessionCell};
use cdn_player::lyrics;
use cdn_player::resolver::{HttpSourceSurface, resolve_track};
use cdn_player::server::{self, AppState};
use cdn_player::stats::StatsDatabase;
use cdn_player::storage::JsonFileStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cdn-player")]
#[command(about = "CDN Player server and source resolver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the play-count API, the catalog, cached audio and static files
    Serve(ServeArgs),
    /// Resolve a playable source for every catalog track
    Resolve(ResolveArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Play log database
    #[arg(long, env = "PLAYER_DB_PATH", default_value = "data/play_logs.db")]
    db: PathBuf,

    /// Catalog feed (JSON)
    #[arg(long, env = "PLAYER_CATALOG", default_value = "data/catalog.json")]
    catalog: PathBuf,

    /// Directory of static web files
    #[arg(long, env = "PLAYER_STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,

    /// Manifest listing the audio files to pre-cache
    #[arg(long, env = "PLAYER_MANIFEST_URL")]
    manifest_url: Option<String>,

    /// Public origin of the site, used to resolve a relative manifest URL
    /// (defaults to this server)
    #[arg(long, env = "PLAYER_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Maximum number of cached audio files
    #[arg(long, env = "PLAYER_CACHE_MAX_ENTRIES", default_value = "64")]
    cache_max_entries: usize,

    /// Name of a static asset partition to keep across manifest changes
    #[arg(long, env = "PLAYER_STATIC_PARTITION")]
    static_partition: Option<String>,
}

#[derive(Parser)]
struct ResolveArgs {
    /// Catalog feed (JSON)
    #[arg(long, env = "PLAYER_CATALOG", default_value = "data/catalog.json")]
    catalog: PathBuf,

    /// Local storage file holding the failed-source registry
    #[arg(long, env = "PLAYER_STATE", default_value = "data/local_storage.json")]
    state: PathBuf,

    /// Minutes a failed source is skipped
    #[arg(long, default_value = "60")]
    retention_minutes: i64,

    /// Also fetch and parse each track's lyrics
    #[arg(long)]
    lyrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Resolve(args) => resolve(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    tracing::info!("Starting CDN Player");

    let stats_db = StatsDatabase::new(&args.db)
        .await
        .context("Failed to initialize stats database")?;
    let catalog = Catalog::load_or_empty(&args.catalog).await;

    let defaults = CacheConfig::default();
    let cache_config = CacheConfig {
        manifest_url: args.manifest_url.unwrap_or(defaults.manifest_url),
        public_base_url: Some(
            args.public_base_url
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", args.port)),
        ),
        max_entries: args.cache_max_entries,
        static_partition: args.static_partition,
        static_assets: Vec::new(),
    };
    let fetcher = ReqwestFetcher::new(Duration::from_secs(30))?;
    let audio_cache = AssetCacheManager::new(cache_config, Arc::new(fetcher));

    let state = AppState {
        stats_db,
        catalog,
        audio_cache: audio_cache.clone(),
    };
    let app = server::create_router(state, &args.static_dir);
    let addr = format!("0.0.0.0:{}", args.port);

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /api/track      - Record a play");
    tracing::info!("  GET  /api/stats      - Global play counts");
    tracing::info!("  GET  /api/catalog    - Catalog tracks");
    tracing::info!("  GET  /audio?src=URL  - Audio through the cache");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    // The default manifest is one of our own static files, so install once listening
    tokio::spawn(server::start_audio_cache(audio_cache));

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

async fn resolve(args: ResolveArgs) -> Result<()> {
    let catalog = Catalog::load_or_empty(&args.catalog).await;
    let store = JsonFileStore::open(&args.state)?;

    let config = EngineConfig {
        retention: chrono::Duration::minutes(args.retention_minutes),
    };
    let registry = FailedUrlRegistry::new(Box::new(store), config.retention);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("Failed to build HTTP client")?;

    let mut engine = FallbackEngine::new(
        HttpSourceSurface::new(client.clone()),
        SessionCell::new(),
        registry,
        Arc::new(SystemClock),
    );

    for track in catalog.tracks() {
        let resolved = resolve_track(&mut engine, Arc::clone(track)).await;
        match resolved {
            Some(url) => println!("{:<8} {} -> {}", track.id, track.title, url),
            None => println!("{:<8} {} -> {}", track.id, track.title, engine.status()),
        }

        if args.lyrics && !track.lrc_sources.is_empty() {
            let text = lyrics::fetch_lrc(&client, &track.lrc_sources).await;
            println!("         {} lyric lines", lyrics::parse_lrc(&text).len());
        }
    }

    tracing::info!(
        "Resolved {} tracks, {} sources on the skip list",
        catalog.len(),
        engine.registry().len()
    );
    Ok(())
}
