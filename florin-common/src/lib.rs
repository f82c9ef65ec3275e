//! Shared types for the Florin finance services
//!
//! Provides the common error type, the event bus used for progress
//! broadcasting, the import job model, and configuration loading.

pub mod config;
pub mod error;
pub mod events;
pub mod jobs;

pub use error::{Error, Result};
