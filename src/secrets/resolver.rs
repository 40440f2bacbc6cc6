//! Key resolution over local configuration and an optional secret store.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::config::{ConfigKey, ConfigLayer};
use crate::secrets::store::{SecretError, SecretStore};

/// Resolves configuration keys, consulting the secret store only for keys
/// missing locally.
///
/// Without a store every lookup is a pure in-memory read. With a store,
/// remote answers (including "absent") are cached for the life of the
/// resolver, so each key costs at most one round-trip.
pub struct SecretResolver {
    local: Arc<ConfigLayer>,
    store: Option<Arc<dyn SecretStore>>,
    cache: DashMap<ConfigKey, Option<String>>,
    timeout: Duration,
}

impl SecretResolver {
    /// Resolver over local values only.
    pub fn local(local: ConfigLayer) -> Self {
        Self {
            local: Arc::new(local),
            store: None,
            cache: DashMap::new(),
            timeout: Duration::ZERO,
        }
    }

    /// Resolver that falls back to `store`, bounding each remote lookup by
    /// `timeout`.
    pub fn with_store(local: ConfigLayer, store: Arc<dyn SecretStore>, timeout: Duration) -> Self {
        Self {
            local: Arc::new(local),
            store: Some(store),
            cache: DashMap::new(),
            timeout,
        }
    }

    pub async fn resolve(&self, key: &ConfigKey) -> Result<String, SecretError> {
        if let Some(value) = self.local.get(key) {
            return Ok(value.clone());
        }

        let Some(store) = &self.store else {
            return Err(SecretError::NotFound(key.to_string()));
        };

        if let Some(cached) = self.cache.get(key) {
            return cached
                .clone()
                .ok_or_else(|| SecretError::NotFound(key.to_string()));
        }

        let name = key.to_secret_name();
        let fetched = tokio::time::timeout(self.timeout, store.get(&name))
            .await
            .map_err(|_| SecretError::Timeout(self.timeout))??;

        tracing::debug!(key = %key, store = store.name(), found = fetched.is_some(), "secret lookup");
        self.cache.insert(key.clone(), fetched.clone());
        fetched.ok_or_else(|| SecretError::NotFound(key.to_string()))
    }

    /// Follow a SecretRef: resolve `reference`, treat its value as a key name,
    /// and resolve that. The second value is returned as-is, never followed.
    pub async fn resolve_ref(&self, reference: &ConfigKey) -> Result<String, SecretError> {
        let target_name = self.resolve(reference).await?;
        let target = ConfigKey::new(&target_name).map_err(|e| {
            SecretError::NotFound(format!("{reference} names an invalid key: {e}"))
        })?;
        self.resolve(&target).await
    }
}
