//! WebSocket progress relay
//!
//! GET /ws authenticates a query-string token before the upgrade, greets the
//! client with an info envelope, then forwards every job update published on
//! the event bus until either side closes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use florin_common::events::ImportEvent;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: String,
}

/// GET /ws?token=...
///
/// A bad token fails with 401 before the protocol upgrade happens.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    if !state.token_validator.validate(&query.token).await {
        return Err(ApiError::Unauthorized("Invalid token".to_string()));
    }
    let rx = state.event_bus.subscribe();
    Ok(ws.on_upgrade(move |socket| relay(socket, rx)))
}

async fn relay(mut socket: WebSocket, mut rx: broadcast::Receiver<ImportEvent>) {
    let hello = ImportEvent::Info {
        message: "Connected to import progress stream".to_string(),
    };
    match serde_json::to_string(&hello) {
        Ok(text) => {
            if socket.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to serialize greeting event");
            return;
        }
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                },
                // A slow client dropping intermediate updates is fine; the
                // next update carries the full job record anyway
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Client lagged behind event stream");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Client disconnected from progress stream");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }
}

/// Build WebSocket routes
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}
