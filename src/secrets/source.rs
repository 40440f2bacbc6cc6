//! Secret store as a configuration source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ConfigError, ConfigKey, ConfigLayer, ConfigSource};
use crate::secrets::store::{SecretError, SecretStore};

/// Loads every secret the store lists into one configuration layer.
///
/// The whole load is bounded by `timeout`; a store that is configured but
/// unreachable fails assembly rather than hanging startup.
pub struct SecretStoreSource {
    store: Arc<dyn SecretStore>,
    timeout: Duration,
}

impl SecretStoreSource {
    pub fn new(store: Arc<dyn SecretStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn load_all(&self) -> Result<ConfigLayer, SecretError> {
        let mut layer = ConfigLayer::new();
        for name in self.store.list().await? {
            let Some(key) = ConfigKey::from_secret_name(&name) else {
                tracing::debug!(secret = %name, "skipping secret with unusable name");
                continue;
            };
            if let Some(value) = self.store.get(&name).await? {
                layer.insert(key, value);
            }
        }
        Ok(layer)
    }
}

#[async_trait]
impl ConfigSource for SecretStoreSource {
    fn name(&self) -> &str {
        "secret store"
    }

    async fn load(&self) -> Result<ConfigLayer, ConfigError> {
        let result = tokio::time::timeout(self.timeout, self.load_all())
            .await
            .unwrap_or(Err(SecretError::Timeout(self.timeout)));

        result.map_err(|source| ConfigError::SecretStore {
            store: self.store.name().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretStore;

    #[tokio::test]
    async fn test_loads_listed_secrets_as_keys() {
        let store = Arc::new(MemorySecretStore::with_secrets([
            ("Logging--Remote--Uri", "http://es:9200"),
            ("vault--token", "t"),
        ]));
        let layer = SecretStoreSource::new(store, Duration::from_secs(1)).load().await.unwrap();

        assert_eq!(layer[&ConfigKey::new("logging.remote.uri").unwrap()], "http://es:9200");
        assert_eq!(layer.len(), 2);
    }

    struct HangingStore;

    #[async_trait]
    impl SecretStore for HangingStore {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn get(&self, _name: &str) -> Result<Option<String>, SecretError> {
            std::future::pending().await
        }

        async fn list(&self) -> Result<Vec<String>, SecretError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_unresponsive_store_times_out() {
        let source = SecretStoreSource::new(Arc::new(HangingStore), Duration::from_millis(50));
        let err = source.load().await.unwrap_err();

        assert!(matches!(
            err,
            ConfigError::SecretStore { source: SecretError::Timeout(_), .. }
        ));
    }
}
