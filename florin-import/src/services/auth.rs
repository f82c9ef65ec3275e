//! Token validation for the progress relay
//!
//! The WebSocket endpoint authenticates with a query-string token checked
//! before the upgrade completes. Validation sits behind a trait so tests can
//! swap in their own implementation.

use async_trait::async_trait;

/// Validates client-supplied tokens for socket upgrades
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> bool;
}

/// Compares against the single token from service configuration
///
/// An empty configured token rejects every connection rather than accepting
/// every connection.
pub struct StaticTokenValidator {
    token: String,
}

impl StaticTokenValidator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> bool {
        !self.token.is_empty() && token == self.token
    }
}
