//! Standalone binary hosting the held-transaction core over HTTP.
//!
//! Wires `txn-db` (connection pool), `txn-core` (Manager + Reaper), and
//! `txn-http` (the axum router) together behind a `clap` CLI and a
//! `figment`-layered [`config::ServerConfig`].

mod config;
mod logging;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use config::ServerConfig;
use txn_core::{Manager, SystemClock};
use txn_db::Db;

/// Held-transaction core server.
#[derive(Parser)]
#[command(name = "txn-server")]
#[command(about = "Held-transaction core: long-lived database transactions over HTTP")]
#[command(version)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address override (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Some(path) = &cli.config {
        anyhow::ensure!(path.is_file(), "config file does not exist: {}", path.display());
    }

    let mut config =
        ServerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = cli.bind {
        config.listen_addr = bind;
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        max_concurrent = config.max_concurrent,
        "held-transaction server starting"
    );

    let db = Db::connect(&config.database_dsn, config.pool_opts())
        .await
        .context("failed to connect to database")?;

    let manager = Manager::new(db, config.txn_config(), Arc::new(SystemClock));
    manager.start_reaper().await;

    let app = txn_http::router(Arc::clone(&manager));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(listen_addr = %config.listen_addr, "accepting connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_shutdown())
        .await
        .context("server loop failed")?;

    tracing::info!("shutting down: rolling back any still-open held transactions");
    manager.shutdown().await;
    Ok(())
}
