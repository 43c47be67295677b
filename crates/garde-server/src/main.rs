//! garde-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! SQLite pharmacy store, and serves the on-duty lookup API over HTTP.
//!
//! ```text
//! garde-server                         # serve
//! garde-server purge --before 2024-06-01
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use garde_core::{finder::DutyFinder, query::parse_date, store::PharmacyStore};
use garde_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "On-duty pharmacy lookup server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Delete duty records dated before the given day and exit.
  Purge {
    /// First date to keep, `YYYY-MM-DD`.
    #[arg(long)]
    before: String,
  },
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

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = server_cfg.store_path();
  let store = SqliteStore::open(&store_path, server_cfg.store_config())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&server_cfg, store).await,
    Command::Purge { before } => {
      let date = parse_date(&before).context("invalid --before date")?;
      let deleted = store
        .purge_duties_before(date)
        .await
        .context("failed to purge duty records")?;
      println!("deleted {deleted} duty records dated before {date}");
      Ok(())
    }
  }
}

async fn serve(server_cfg: &ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let finder = DutyFinder::new(Arc::new(store), server_cfg.query_config());
  finder.health().await.context("store health check failed")?;

  let app = garde_api::api_router(finder).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
