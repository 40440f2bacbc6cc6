//! Hierarchical configuration keys.
//!
//! Keys are dot-delimited and case-insensitive. They are normalised to lower
//! case on construction so that `Vault.Endpoint`, `vault:endpoint` and
//! `vault.endpoint` all name the same value.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separator used by secret stores that reject `.` in secret names.
const SECRET_NAME_SEPARATOR: &str = "--";

/// Separator used between levels in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// A configuration key could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration key '{raw}': {reason}")]
pub struct InvalidKey {
    pub raw: String,
    pub reason: &'static str,
}

/// Normalised, dot-delimited configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey(String);

impl ConfigKey {
    /// Parse a key, accepting `.` or `:` as level separators.
    pub fn new(raw: &str) -> Result<Self, InvalidKey> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidKey { raw: raw.to_string(), reason: "key is empty" });
        }

        let mut segments = Vec::new();
        for segment in trimmed.split(['.', ':']) {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(InvalidKey { raw: raw.to_string(), reason: "empty segment" });
            }
            segments.push(segment.to_ascii_lowercase());
        }

        Ok(Self(segments.join(".")))
    }

    /// Map an environment variable name to a key.
    ///
    /// Returns `None` when the variable does not carry `prefix`. The prefix
    /// match is case-insensitive; `__` separates levels.
    pub fn from_env_var(name: &str, prefix: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let rest = upper.strip_prefix(&prefix.to_ascii_uppercase())?;
        let dotted = rest.split(ENV_SEPARATOR).collect::<Vec<_>>().join(".");
        Self::new(&dotted).ok()
    }

    /// Map a secret-store secret name (`logging--remote--uri`) to a key.
    pub fn from_secret_name(name: &str) -> Option<Self> {
        let dotted = name.split(SECRET_NAME_SEPARATOR).collect::<Vec<_>>().join(".");
        Self::new(&dotted).ok()
    }

    /// Secret-store name for this key.
    pub fn to_secret_name(&self) -> String {
        self.0.replace('.', SECRET_NAME_SEPARATOR)
    }

    /// Append a child segment.
    pub fn child(&self, segment: &str) -> Result<Self, InvalidKey> {
        Self::new(&format!("{}.{}", self.0, segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConfigKey {
    type Err = InvalidKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Borrow<str> for ConfigKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let a = ConfigKey::new("Vault.Endpoint").unwrap();
        let b = ConfigKey::new("vault:ENDPOINT").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "vault.endpoint");
    }

    #[test]
    fn test_rejects_empty_segments() {
        assert!(ConfigKey::new("").is_err());
        assert!(ConfigKey::new("vault..endpoint").is_err());
        assert!(ConfigKey::new(".vault").is_err());
    }

    #[test]
    fn test_env_var_mapping() {
        let key = ConfigKey::from_env_var("LOGVAULT_VAULT__ENDPOINT", "LOGVAULT_").unwrap();
        assert_eq!(key.as_str(), "vault.endpoint");

        assert!(ConfigKey::from_env_var("PATH", "LOGVAULT_").is_none());
    }

    #[test]
    fn test_secret_name_mapping() {
        let key = ConfigKey::from_secret_name("Logging--Remote--Uri").unwrap();
        assert_eq!(key.as_str(), "logging.remote.uri");
        assert_eq!(key.to_secret_name(), "logging--remote--uri");
    }
}
