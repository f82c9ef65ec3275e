//! florin-import library interface
//!
//! Exposes the import pipeline and HTTP surface for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use florin_common::events::EventBus;

use crate::services::auth::TokenValidator;
use crate::services::job_store::JobStore;
use crate::services::queue::ImportQueue;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus feeding the WebSocket progress relay
    pub event_bus: EventBus,
    /// Job record store
    pub job_store: Arc<dyn JobStore>,
    /// In-process import queue
    pub queue: ImportQueue,
    /// Token check for socket upgrades
    pub token_validator: Arc<dyn TokenValidator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        job_store: Arc<dyn JobStore>,
        queue: ImportQueue,
        token_validator: Arc<dyn TokenValidator>,
    ) -> Self {
        Self {
            db,
            event_bus,
            job_store,
            queue,
            token_validator,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::import_routes())
        .merge(api::ws_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
