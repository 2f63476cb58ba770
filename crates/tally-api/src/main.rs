//! `tallyd` — the Tally reconciliation server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the JSON API over HTTP.
//!
//! # Configuration
//!
//! ```toml
//! host       = "127.0.0.1"
//! port       = 5480
//! store_path = "~/.local/share/tally/tally.db"
//!
//! [engine]
//! auto_link_threshold   = 0.8
//! min_suggest_threshold = 0.4
//! max_suggestions       = 5
//! batch_throttle_ms     = 250
//! ```
//!
//! Every key can also be set through the environment with a `TALLY_` prefix,
//! e.g. `TALLY_PORT=8080`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use tally_core::engine::{EngineConfig, LinkingEngine};
use tally_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tally reconciliation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:       String,
  #[serde(default = "default_port")]
  port:       u16,
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  #[serde(default)]
  engine:     EngineSection,
}

/// Optional overrides for the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
struct EngineSection {
  auto_link_threshold:   Option<f64>,
  min_suggest_threshold: Option<f64>,
  max_suggestions:       Option<usize>,
  batch_throttle_ms:     Option<u64>,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 5480 }

fn default_store_path() -> PathBuf { PathBuf::from("tally.db") }

impl EngineSection {
  fn into_engine_config(self) -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(t) = self.auto_link_threshold {
      config.policy.auto_link_threshold = t;
    }
    if let Some(t) = self.min_suggest_threshold {
      config.policy.min_suggest_threshold = t;
    }
    if let Some(n) = self.max_suggestions {
      config.policy.max_suggestions = n;
    }
    config.batch_throttle = self.batch_throttle_ms.map(Duration::from_millis);
    config
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store and build the engine.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let engine = Arc::new(LinkingEngine::with_config(
    store,
    server_cfg.engine.clone().into_engine_config(),
  ));

  let app = axum::Router::new()
    .nest("/api", tally_api::api_router(engine))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/") {
    if let Ok(home) = std::env::var("HOME") {
      return PathBuf::from(home).join(rest);
    }
  }
  path.to_path_buf()
}
