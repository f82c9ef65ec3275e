//! Event types and broadcast bus for the Florin services
//!
//! Progress events flow worker → `EventBus` → progress relay → browser.
//! The bus uses `tokio::broadcast` internally: non-blocking publish, any
//! number of concurrent subscribers, automatic cleanup when receivers drop.

use crate::jobs::ImportJob;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Florin event types
///
/// Serialized with a `type` tag so browser clients can dispatch on it; the
/// `info` variant is sent once per socket on connect, `jobUpdated` carries a
/// full job snapshot once per bounded progress increment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImportEvent {
    /// Informational message, sent once on socket connect
    #[serde(rename = "info")]
    Info { message: String },

    /// Full job snapshot published after a status-store write
    #[serde(rename = "jobUpdated")]
    JobUpdated {
        #[serde(flatten)]
        job: ImportJob,
    },
}

/// Central event distribution bus
///
/// Slow subscribers lag rather than block producers; lagged receivers see a
/// `RecvError::Lagged` and can resubscribe. Publishing with no subscribers is
/// not an error for progress events (clients may simply not be connected).
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ImportEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of receivers the event reached; zero when nobody
    /// is listening, which is fine for progress snapshots.
    pub fn emit(&self, event: ImportEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }
}
