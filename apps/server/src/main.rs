//! queue-server entry point
//!
//! Serves the queue API, or with `--migrate-only` applies the database
//! migrations and exits.

use anyhow::Context;
use clap::Parser;
use medqueue::{
    api::create_router,
    config::{Config, StoreBackend},
    db, logging,
    state::AppState,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(name = "queue-server")]
#[clap(about = "Hospital walk-in queue ticketing and dispatch server")]
struct Args {
    /// Configuration file (TOML, YAML or JSON); defaults to ./config.*
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Apply database migrations and exit
    #[clap(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config =
        Config::load_from(args.config.as_deref()).context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    // Flushes telemetry when dropped at the end of main
    let _telemetry =
        logging::init_logging(&config.logging).context("Failed to initialize logging/telemetry")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.logging.deployment_environment,
        backend = ?config.database.backend,
        "Starting queue server"
    );

    if args.migrate_only {
        migrate(&config).await
    } else {
        serve(config).await
    }
}

async fn migrate(config: &Config) -> anyhow::Result<()> {
    if config.database.backend != StoreBackend::Postgres {
        anyhow::bail!("--migrate-only requires the postgres backend");
    }
    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Migrations applied");
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config
        .socket_addr()
        .context("Failed to determine socket address")?;
    let utc_offset_minutes = config.queue.utc_offset_minutes;

    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {addr}"))?;
    tracing::info!(
        listen_addr = %addr,
        utc_offset_minutes,
        "Queue API listening on http://{}/api/queue",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Server terminated unexpectedly");
            anyhow::Error::from(e)
        })?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on SIGTERM (container stop) or Ctrl+C.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).expect("Failed to install SIGTERM signal handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received, draining connections"),
        _ = sigterm.recv() => tracing::info!("SIGTERM received, draining connections"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, draining connections");
}
