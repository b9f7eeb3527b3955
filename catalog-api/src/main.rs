//! Catalog API (catalog-api) - Main entry point
//!
//! Serves the mock catalog REST API over HTTP with per-client rate limiting.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use catalog_common::config::{Config, ConfigOverrides, StoreBackend};
use catalog_common::db::{bootstrap_schema, connect, SchemaRegistry};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_api::rate_limit::{MemoryWindowStore, RateLimiter, SqliteWindowStore, WindowStore};
use catalog_api::{build_router, AppState};

/// Command-line arguments for catalog-api
#[derive(Parser, Debug)]
#[command(name = "catalog-api")]
#[command(about = "Mock catalog REST API")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CATALOG_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8080
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_api=info,catalog_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    config
        .apply_overrides(&ConfigOverrides {
            bind: args.bind,
            database: args.database,
        })
        .context("Invalid command-line override")?;

    info!("Starting catalog-api v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database.path.display());

    let pool = connect(&config.database.path, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    let created = bootstrap_schema(&pool, SchemaRegistry::catalog())
        .await
        .context("Failed to bootstrap schema")?;
    if !created.is_empty() {
        info!("Created tables: {}", created.join(", "));
    }

    let store: Arc<dyn WindowStore> = match config.rate_limit.backend {
        StoreBackend::Memory => Arc::new(MemoryWindowStore::new()),
        StoreBackend::Sqlite => Arc::new(SqliteWindowStore::new(pool.clone())),
    };
    info!("Rate-limit store: {:?}", config.rate_limit.backend);

    let limiter = Arc::new(RateLimiter::new(store, config.rate_limit.tiers.clone()));
    let sweeper = Arc::clone(&limiter)
        .spawn_sweeper(Duration::from_secs(config.rate_limit.sweep_interval_secs));

    let app = build_router(AppState::new(pool.clone(), limiter)).context("Invalid route table")?;

    let addr = config.bind_addr()?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
