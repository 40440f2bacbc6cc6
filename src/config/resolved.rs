//! The immutable, fully merged configuration snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::key::ConfigKey;

/// One configuration layer (or a merge of several).
pub type ConfigLayer = BTreeMap<ConfigKey, String>;

/// Read-only mapping from [`ConfigKey`] to value, built once at startup.
///
/// Cloning is cheap; all clones share one snapshot.
#[derive(Clone, Default)]
pub struct ResolvedConfig {
    values: Arc<ConfigLayer>,
}

impl ResolvedConfig {
    pub fn from_layer(values: ConfigLayer) -> Self {
        Self {
            values: Arc::new(values),
        }
    }

    /// Look up a key; the lookup is case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = ConfigKey::new(key).ok()?;
        self.values.get(&key).map(String::as_str)
    }

    /// Look up a key, treating blank values as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn get_key(&self, key: &ConfigKey) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.values.keys()
    }

    /// Copy of the underlying layer, for re-use as an input to another merge.
    pub fn to_layer(&self) -> ConfigLayer {
        self.values.as_ref().clone()
    }
}

// Values may be secrets; only keys are printed.
impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("keys", &self.values.keys().map(ConfigKey::as_str).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> ResolvedConfig {
        ResolvedConfig::from_layer(
            pairs
                .iter()
                .map(|(k, v)| (ConfigKey::new(k).unwrap(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let cfg = config(&[("vault.endpoint", "https://vault")]);
        assert_eq!(cfg.get("Vault.Endpoint"), Some("https://vault"));
        assert_eq!(cfg.get("Vault:Endpoint"), Some("https://vault"));
        assert!(cfg.get("vault.token").is_none());
    }

    #[test]
    fn test_blank_values_are_absent_for_non_empty() {
        let cfg = config(&[("vault.endpoint", "   ")]);
        assert!(cfg.contains("vault.endpoint"));
        assert!(cfg.get_non_empty("vault.endpoint").is_none());
    }

    #[test]
    fn test_debug_hides_values() {
        let cfg = config(&[("vault.token", "s3cret")]);
        let printed = format!("{cfg:?}");
        assert!(printed.contains("vault.token"));
        assert!(!printed.contains("s3cret"));
    }
}
