//! meterscan-api - meter reading service
//!
//! Accepts meter photos, estimates readings through the Gemini vision API,
//! stores them in SQLite and serves the confirm/list endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use meterscan_common::config::{CliOverrides, ServiceConfig};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meterscan_api::services::{GeminiVisionClient, ImageStore};
use meterscan_api::{build_router, AppState};

const RATE_LIMIT_SWEEP_SECS: u64 = 300;

/// Command-line arguments for meterscan-api
///
/// Anything not given here falls back to the environment, then the
/// config file, then compiled defaults.
#[derive(Parser, Debug)]
#[command(name = "meterscan-api")]
#[command(about = "Meter reading service backed by a vision API")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Database URL (e.g. sqlite://meterscan.db?mode=rwc)
    #[arg(long)]
    database_url: Option<String>,

    /// Directory where uploaded meter images are stored
    #[arg(long)]
    images_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meterscan_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting meterscan-api v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = ServiceConfig::resolve(CliOverrides {
        port: args.port,
        database_url: args.database_url,
        images_dir: args.images_dir,
    })
    .context("Failed to resolve configuration")?;

    let pool = meterscan_common::db::init_database(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database ready");

    tokio::fs::create_dir_all(&config.images_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.images_dir.display()))?;
    info!("Images directory: {}", config.images_dir.display());

    let image_store = ImageStore::new(config.images_dir.clone(), config.public_base_url.clone());
    let vision = GeminiVisionClient::new(
        config.gemini_api_key.clone(),
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
        image_store,
    )
    .context("Failed to build vision client")?;
    info!("Vision client ready (model {})", config.gemini_model);

    let state = AppState::new(pool.clone(), Arc::new(vision), config.images_dir.clone());

    // Forget idle clients so the limiter map does not grow without bound
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_SWEEP_SECS));
        loop {
            interval.tick().await;
            limiter.retain_recent();
        }
    });

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
