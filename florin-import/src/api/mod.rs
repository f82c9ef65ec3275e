//! HTTP API handlers for florin-import

pub mod health;
pub mod import;
pub mod ws;

pub use health::health_routes;
pub use import::import_routes;
pub use ws::ws_routes;
