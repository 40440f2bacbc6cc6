//! Layered configuration assembly.

use std::sync::Arc;
use std::time::Duration;

use crate::config::key::ConfigKey;
use crate::config::loader::{ConfigError, ConfigSource};
use crate::config::resolved::{ConfigLayer, ResolvedConfig};
use crate::secrets::{SecretError, SecretResolver, SecretStore};

/// A key whose value names another key holding the real value.
///
/// After merging, the assembler resolves `reference` and then the key it
/// names, and stores the result under `target`. The result is never
/// dereferenced again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub reference: ConfigKey,
    pub target: ConfigKey,
}

impl SecretRef {
    pub fn new(reference: &str, target: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            reference: ConfigKey::new(reference)?,
            target: ConfigKey::new(target)?,
        })
    }
}

/// Merges ordered sources into a [`ResolvedConfig`].
///
/// Sources are applied in the order added; a later source overrides an
/// earlier one for the same key.
#[derive(Default)]
pub struct Assembler {
    sources: Vec<Box<dyn ConfigSource>>,
    secret_refs: Vec<SecretRef>,
    required: Vec<ConfigKey>,
    store: Option<(Arc<dyn SecretStore>, Duration)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn boxed_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn secret_ref(mut self, secret_ref: SecretRef) -> Self {
        self.secret_refs.push(secret_ref);
        self
    }

    pub fn require(mut self, key: ConfigKey) -> Self {
        self.required.push(key);
        self
    }

    /// Store consulted for SecretRef targets missing from every layer.
    pub fn secret_store(mut self, store: Arc<dyn SecretStore>, timeout: Duration) -> Self {
        self.store = Some((store, timeout));
        self
    }

    pub async fn assemble(self) -> Result<ResolvedConfig, ConfigError> {
        let mut merged = ConfigLayer::new();
        for source in &self.sources {
            let layer = source.load().await?;
            tracing::debug!(source = source.name(), keys = layer.len(), "configuration layer loaded");
            merged.extend(layer);
        }

        if !self.secret_refs.is_empty() {
            let resolver = match &self.store {
                Some((store, timeout)) => SecretResolver::with_store(merged.clone(), store.clone(), *timeout),
                None => SecretResolver::local(merged.clone()),
            };
            for secret_ref in &self.secret_refs {
                dereference(&resolver, secret_ref, &mut merged).await;
            }
        }

        let missing: Vec<ConfigKey> = self
            .required
            .into_iter()
            .filter(|key| !merged.contains_key(key))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        Ok(ResolvedConfig::from_layer(merged))
    }
}

/// Unset references are skipped. A reference whose target cannot be resolved
/// leaves the target untouched; callers treat an absent target as "feature
/// not configured".
async fn dereference(resolver: &SecretResolver, secret_ref: &SecretRef, merged: &mut ConfigLayer) {
    if !merged.contains_key(&secret_ref.reference) {
        return;
    }

    match resolver.resolve_ref(&secret_ref.reference).await {
        Ok(value) => {
            tracing::debug!(reference = %secret_ref.reference, target = %secret_ref.target, "secret reference resolved");
            merged.insert(secret_ref.target.clone(), value);
        }
        Err(SecretError::NotFound(name)) => {
            tracing::warn!(
                reference = %secret_ref.reference,
                missing = %name,
                "secret reference names a key that does not exist"
            );
        }
        Err(error) => {
            tracing::warn!(
                reference = %secret_ref.reference,
                error = %error,
                "secret reference could not be resolved"
            );
        }
    }
}
