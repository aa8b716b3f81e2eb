//! battwatch service - battery telemetry collector and HTTP API.
//!
//! Run with: `cargo run -p battwatch-service`

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use battwatch_service::{AppState, Config, api};
use battwatch_store::{FlushOutcome, JsonFileStorage, PersistenceScheduler};

/// battwatch service - battery telemetry collector and HTTP API.
#[derive(Parser, Debug)]
#[command(name = "battwatch-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "BATTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, env = "BATTWATCH_BIND")]
    bind: Option<String>,

    /// Snapshot file path (overrides config).
    #[arg(short, long, env = "BATTWATCH_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Number of samples kept in memory (overrides config).
    #[arg(long)]
    capacity: Option<usize>,

    /// Samples between snapshot writes; 0 writes only on shutdown (overrides config).
    #[arg(long)]
    flush_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("battwatch_service=info".parse()?)
                .add_directive("battwatch_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_else(|e| {
            warn!("Using default configuration: {}", e);
            Config::default()
        }),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(path) = args.snapshot {
        config.storage.snapshot_path = path;
    }
    if let Some(capacity) = args.capacity {
        config.history.capacity = capacity;
    }
    if let Some(interval) = args.flush_interval {
        config.storage.flush_interval = interval;
    }

    config.validate()?;

    let policy = config.storage.flush_policy();
    info!(
        "Snapshot at {:?}, flushing {}",
        config.storage.snapshot_path, policy
    );
    let storage = JsonFileStorage::new(&config.storage.snapshot_path);
    let scheduler = PersistenceScheduler::new(Arc::new(storage), policy);

    let bind = config.server.bind.clone();
    let state = AppState::restore(scheduler, config);
    let app = api::app(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, writing final snapshot");
    match state.flush_now().await {
        FlushOutcome::Written { samples } => info!("Saved {} samples", samples),
        FlushOutcome::Failed(e) => warn!("Final snapshot failed: {}", e),
        FlushOutcome::Skipped | FlushOutcome::Superseded => info!("Snapshot already current"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
