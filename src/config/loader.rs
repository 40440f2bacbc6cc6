//! Configuration sources: defaults, TOML file, environment.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::key::{ConfigKey, InvalidKey};
use crate::config::resolved::ConfigLayer;
use crate::config::schema::DEFAULTS;
use crate::config::validation::ValidationError;
use crate::secrets::SecretError;

/// Error type for configuration loading and assembly.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    #[error("missing required configuration keys: {}", join_keys(.0))]
    MissingKeys(Vec<ConfigKey>),

    #[error("secret store '{store}' failed: {source}")]
    SecretStore {
        store: String,
        #[source]
        source: SecretError,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_keys(keys: &[ConfigKey]) -> String {
    keys.iter().map(ConfigKey::as_str).collect::<Vec<_>>().join(", ")
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// A source contributing one layer to the merged configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    async fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults; always the lowest layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultsSource;

#[async_trait]
impl ConfigSource for DefaultsSource {
    fn name(&self) -> &str {
        "defaults"
    }

    async fn load(&self) -> Result<ConfigLayer, ConfigError> {
        let mut layer = ConfigLayer::new();
        for (key, value) in DEFAULTS {
            layer.insert(ConfigKey::new(key)?, (*value).to_string());
        }
        Ok(layer)
    }
}

/// TOML file, flattened into dotted keys.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    optional: bool,
}

impl FileSource {
    /// A file that must exist.
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), optional: false }
    }

    /// A file that yields an empty layer when missing.
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), optional: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Result<ConfigLayer, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if self.optional && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "optional config file not found");
                return Ok(ConfigLayer::new());
            }
            Err(source) => {
                return Err(ConfigError::Io { path: self.path.clone(), source });
            }
        };
        parse_toml(&content).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse { path: self.path.clone(), source },
            ParseFailure::Key(e) => ConfigError::InvalidKey(e),
        })
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Key(InvalidKey),
}

fn parse_toml(content: &str) -> Result<ConfigLayer, ParseFailure> {
    let table: toml::Table = content.parse().map_err(ParseFailure::Toml)?;
    let mut layer = ConfigLayer::new();
    for (name, value) in &table {
        flatten(&mut layer, name, value).map_err(ParseFailure::Key)?;
    }
    Ok(layer)
}

fn flatten(layer: &mut ConfigLayer, prefix: &str, value: &toml::Value) -> Result<(), InvalidKey> {
    match value {
        toml::Value::Table(table) => {
            for (name, child) in table {
                flatten(layer, &format!("{prefix}.{name}"), child)?;
            }
        }
        toml::Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten(layer, &format!("{prefix}.{i}"), child)?;
            }
        }
        toml::Value::String(s) => {
            layer.insert(ConfigKey::new(prefix)?, s.clone());
        }
        other => {
            layer.insert(ConfigKey::new(prefix)?, other.to_string());
        }
    }
    Ok(())
}

/// Process environment variables carrying a prefix.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
    /// Read from the process environment at load time.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), vars: None }
    }

    /// Read from a fixed set of variables instead of the process environment.
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    async fn load(&self) -> Result<ConfigLayer, ConfigError> {
        let vars: Vec<(String, String)> = match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        };

        let mut layer = ConfigLayer::new();
        for (name, value) in vars {
            if let Some(key) = ConfigKey::from_env_var(&name, &self.prefix) {
                layer.insert(key, value);
            }
        }
        Ok(layer)
    }
}

/// Fixed in-memory layer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    values: ConfigLayer,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, values: ConfigLayer) -> Self {
        Self { name: name.into(), values }
    }

    pub fn from_pairs<I, K, V>(name: impl Into<String>, pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = ConfigLayer::new();
        for (key, value) in pairs {
            values.insert(ConfigKey::new(key.as_ref())?, value.into());
        }
        Ok(Self::new(name, values))
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<ConfigLayer, ConfigError> {
        Ok(self.values.clone())
    }
}
