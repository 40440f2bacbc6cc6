//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of values in the merged snapshot (types, ranges)
//! - Collect every problem rather than stopping at the first
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before any sink is constructed (fail fast, never half-configured)

use std::fmt;
use std::str::FromStr;

use crate::config::resolved::ResolvedConfig;

/// A single invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub key: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Typed reader over a [`ResolvedConfig`] that records failures instead of
/// returning early.
pub struct Validator<'a> {
    config: &'a ResolvedConfig,
    errors: Vec<ValidationError>,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self { config, errors: Vec::new() }
    }

    /// Parse `key`, falling back to `default` when absent or invalid.
    /// Invalid values are recorded.
    pub fn parsed<T>(&mut self, key: &str, default: T) -> T
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.config.get_non_empty(key) {
            None => default,
            Some(raw) => match raw.parse() {
                Ok(value) => value,
                Err(e) => {
                    self.reject(key, format!("invalid value '{raw}': {e}"));
                    default
                }
            },
        }
    }

    /// Parse a strictly positive integer.
    pub fn positive(&mut self, key: &str, default: u64) -> u64 {
        let value = self.parsed(key, default);
        if value == 0 {
            self.reject(key, "must be greater than zero");
            return default;
        }
        value
    }

    pub fn optional_string(&self, key: &str) -> Option<String> {
        self.config.get_non_empty(key).map(str::to_string)
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.optional_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn reject(&mut self, key: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            key: key.to_string(),
            message: message.into(),
        });
    }

    pub fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::key::ConfigKey;

    fn config(pairs: &[(&str, &str)]) -> ResolvedConfig {
        ResolvedConfig::from_layer(
            pairs
                .iter()
                .map(|(k, v)| (ConfigKey::new(k).unwrap(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_collects_all_errors() {
        let cfg = config(&[("a", "x"), ("b", "0"), ("c", "7")]);
        let mut v = Validator::new(&cfg);

        assert_eq!(v.parsed::<u64>("a", 1), 1);
        assert_eq!(v.positive("b", 5), 5);
        assert_eq!(v.positive("c", 5), 7);
        assert_eq!(v.parsed::<u64>("missing", 9), 9);

        let errors = v.finish().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].key, "a");
        assert_eq!(errors[1].key, "b");
    }
}
