//! Core trait and error type for secret stores.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during secret store operations.
#[derive(Debug, Clone, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret store did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("secret store rejected the credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("invalid secret store endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("secret store transport error: {0}")]
    Transport(String),

    #[error("malformed secret store response: {0}")]
    Malformed(String),
}

/// An external store holding sensitive configuration values.
///
/// Names are store-native (`logging--remote--uri`); mapping from
/// [`ConfigKey`](crate::config::ConfigKey) is the caller's concern.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Human-readable name of this store.
    fn name(&self) -> &str;

    /// Fetch one secret. `Ok(None)` means the store answered and has no such
    /// secret.
    async fn get(&self, name: &str) -> Result<Option<String>, SecretError>;

    /// Names of every secret the store is willing to enumerate.
    ///
    /// Stores that cannot enumerate return an empty list; their values are
    /// still reachable through [`get`](SecretStore::get).
    async fn list(&self) -> Result<Vec<String>, SecretError> {
        Ok(Vec::new())
    }
}
