//! florin-import - CSV transaction import microservice
//!
//! Accepts base64-encoded bank CSV exports over HTTP, runs each import as an
//! asynchronous job with deduplication against previously stored
//! transactions, and relays per-job progress to WebSocket clients.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use florin_common::config::{ServiceConfig, TomlConfig};
use florin_common::events::EventBus;
use florin_import::services::auth::StaticTokenValidator;
use florin_import::services::job_store::SqliteJobStore;
use florin_import::services::queue::ImportQueue;
use florin_import::services::worker::ImportWorker;
use florin_import::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("FLORIN_CONFIG").unwrap_or_else(|_| "florin.toml".to_string());
    let toml_config = TomlConfig::load(Path::new(&config_path))?;
    let config = ServiceConfig::resolve(&toml_config);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    info!("Starting florin-import microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path);

    if config.api_token.is_empty() {
        warn!("No API token configured; progress socket will reject all clients");
    }

    let db_pool = florin_import::db::init_database_pool(Path::new(&config.database_path)).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);

    let job_store = Arc::new(SqliteJobStore::new(
        db_pool.clone(),
        event_bus.clone(),
        config.job_ttl_seconds,
    ));
    let worker = ImportWorker::new(db_pool.clone(), job_store.clone());
    let queue = ImportQueue::start(worker);

    let token_validator = Arc::new(StaticTokenValidator::new(config.api_token.clone()));

    let state = AppState::new(db_pool, event_bus, job_store, queue, token_validator);
    let app = florin_import::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Listening on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
