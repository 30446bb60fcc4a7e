//! curio-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `CURIO_*` environment variables, opens an in-process SQLite store, and
//! serves the engagement API over HTTP.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use curio_api::{AppState, ServerConfig};
use curio_engage::{
  EngageConfig,
  Engagement,
  bus::LifecycleBus,
  fingerprint::local_identity,
  fs_objects::FsObjectStore,
  memory::MemoryCache,
};
use curio_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// How often expired dedup markers are purged from the in-memory cache.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about = "Curio engagement server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CURIO"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let object_dir = expand_tilde(&server_cfg.object_dir);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  tokio::fs::create_dir_all(&object_dir)
    .await
    .with_context(|| format!("failed to create object dir {object_dir:?}"))?;
  let objects = Arc::new(FsObjectStore::new(object_dir));

  let cache = Arc::new(MemoryCache::new());
  let bus = Arc::new(LifecycleBus::spawn(store.clone(), objects));

  let engine = Engagement::new(
    store,
    cache.clone(),
    bus.clone(),
    EngageConfig { dedup_window: Duration::from_secs(server_cfg.dedup_window_secs) },
  );

  let loopback_alias = server_cfg.loopback_alias.clone().or_else(local_identity);
  tracing::debug!(?loopback_alias, "loopback visitors resolved");

  let state = AppState {
    engine:       engine.clone(),
    fingerprints: Arc::new(server_cfg.fingerprint_resolver(loopback_alias)),
  };

  let maintenance = tokio::spawn(maintain(
    engine,
    cache,
    server_cfg
      .like_resync_interval_secs
      .filter(|secs| *secs > 0)
      .map(Duration::from_secs),
  ));

  let app = curio_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .with_graceful_shutdown(shutdown_signal())
  .await
  .context("server error")?;

  maintenance.abort();
  tracing::info!("draining lifecycle cleanup");
  bus.close().await;

  Ok(())
}

/// Purge expired dedup markers and, when configured, resync like counts.
async fn maintain(
  engine: Engagement<SqliteStore, MemoryCache>,
  cache: Arc<MemoryCache>,
  resync_every: Option<Duration>,
) {
  let mut purge = tokio::time::interval(PURGE_INTERVAL);
  let mut resync = tokio::time::interval(resync_every.unwrap_or(PURGE_INTERVAL));
  // Both intervals fire immediately; skip that first tick.
  purge.tick().await;
  resync.tick().await;

  loop {
    tokio::select! {
      _ = purge.tick() => {
        let purged = cache.purge_expired();
        if purged > 0 {
          tracing::debug!(purged, "expired dedup markers purged");
        }
      }
      _ = resync.tick(), if resync_every.is_some() => {
        if let Err(e) = engine.resync_all_likes().await {
          tracing::warn!(error = %e, "periodic like resync failed");
        }
      }
    }
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
