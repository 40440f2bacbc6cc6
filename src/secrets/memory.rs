//! In-memory secret store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::store::{SecretError, SecretStore};

/// In-memory secret store for tests and embedding.
///
/// Counts every `get`/`list` call so callers can assert whether a code path
/// touched the store at all.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secrets<I, K, V>(secrets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: RwLock::new(secrets.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of store round-trips performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let secrets = self
            .secrets
            .read()
            .map_err(|_| SecretError::Transport("memory store lock poisoned".into()))?;
        Ok(secrets.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<String>, SecretError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let secrets = self
            .secrets
            .read()
            .map_err(|_| SecretError::Transport("memory store lock poisoned".into()))?;
        let mut names: Vec<String> = secrets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
