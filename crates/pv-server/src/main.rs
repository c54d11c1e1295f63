//! Main application entry point

use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use pv_data::CsvSeriesExtractor;
use pv_server::{router, Cli, PlotService, ServerConfig, StorageConfig, Stores};
use pv_store::{MemoryStore, SqliteStore};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::load(&cli)?;

    let stores = match &config.storage {
        StorageConfig::Memory => {
            warn!("No database configured, records are kept in memory");
            Stores::from_backend(Arc::new(MemoryStore::new()))
        }
        StorageConfig::Sqlite { path } => {
            let store = SqliteStore::open(path)
                .with_context(|| format!("opening database {}", path.display()))?;
            Stores::from_backend(Arc::new(store))
        }
    };

    tokio::fs::create_dir_all(&config.csv_dir)
        .await
        .with_context(|| format!("creating CSV folder {}", config.csv_dir.display()))?;

    let service = PlotService::new(
        stores,
        CsvSeriesExtractor::new(config.csv.clone()),
        &config.csv_dir,
        &config.csv_mimetype,
    )
    .with_zoom_settings(config.client.zoom_settings()?);

    let app = router(Arc::new(service), config.max_upload_bytes);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, csv_dir = %config.csv_dir.display(), "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
