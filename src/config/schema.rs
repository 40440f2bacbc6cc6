//! Configuration schema definitions.
//!
//! This module names every recognised key, provides the built-in defaults
//! layer, and turns a [`ResolvedConfig`] into typed settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::resolved::ResolvedConfig;
use crate::config::validation::{ValidationError, Validator};
use crate::event::{ChannelPattern, LogLevel};
use crate::resilience::RetryPolicy;

/// Recognised configuration keys.
pub mod keys {
    pub const VAULT_ENDPOINT: &str = "vault.endpoint";
    pub const VAULT_TOKEN: &str = "vault.token";
    pub const VAULT_CONNECT_TIMEOUT_MS: &str = "vault.connect_timeout_ms";
    pub const VAULT_REQUEST_TIMEOUT_MS: &str = "vault.request_timeout_ms";
    /// SecretRef: its value is the name of the key holding the remote sink URI.
    pub const LOG_DESTINATION_SECRET_NAME: &str = "vault.log_destination_secret_name";

    pub const REMOTE_URI: &str = "logging.remote.uri";
    pub const REMOTE_INDEX_FORMAT: &str = "logging.remote.index_format";
    pub const REMOTE_DEAD_LETTER_FORMAT: &str = "logging.remote.dead_letter_format";
    pub const REMOTE_MINIMUM_LEVEL: &str = "logging.remote.minimum_level";
    pub const REMOTE_AUTO_REGISTER_TEMPLATE: &str = "logging.remote.auto_register_template";
    pub const REMOTE_TEMPLATE_NAME: &str = "logging.remote.template_name";
    pub const REMOTE_BATCH_SIZE: &str = "logging.remote.batch_size";
    pub const REMOTE_QUEUE_CAPACITY: &str = "logging.remote.queue_capacity";
    pub const REMOTE_REQUEST_TIMEOUT_MS: &str = "logging.remote.request_timeout_ms";
    pub const REMOTE_RETRY_MAX_ATTEMPTS: &str = "logging.remote.retry.max_attempts";
    pub const REMOTE_RETRY_BASE_DELAY_MS: &str = "logging.remote.retry.base_delay_ms";
    pub const REMOTE_RETRY_MAX_DELAY_MS: &str = "logging.remote.retry.max_delay_ms";
    pub const REMOTE_DEAD_LETTER_SPOOL: &str = "logging.remote.dead_letter_spool";

    pub const CONSOLE_MINIMUM_LEVEL: &str = "logging.console.minimum_level";
    pub const CONSOLE_FORMAT: &str = "logging.console.format";
    pub const FLUSH_TIMEOUT_MS: &str = "logging.flush_timeout_ms";

    pub const APPLICATION_NAME: &str = "application.name";
}

/// Lowest-precedence layer. Every key the sink registry needs has an entry
/// here, so a merged snapshot is always total for them.
pub const DEFAULTS: &[(&str, &str)] = &[
    (keys::VAULT_ENDPOINT, ""),
    (keys::VAULT_CONNECT_TIMEOUT_MS, "5000"),
    (keys::VAULT_REQUEST_TIMEOUT_MS, "10000"),
    (keys::REMOTE_INDEX_FORMAT, "logging-{date}"),
    (keys::REMOTE_MINIMUM_LEVEL, "Information"),
    (keys::REMOTE_AUTO_REGISTER_TEMPLATE, "true"),
    (keys::REMOTE_BATCH_SIZE, "50"),
    (keys::REMOTE_QUEUE_CAPACITY, "10000"),
    (keys::REMOTE_REQUEST_TIMEOUT_MS, "5000"),
    (keys::REMOTE_RETRY_MAX_ATTEMPTS, "3"),
    (keys::REMOTE_RETRY_BASE_DELAY_MS, "200"),
    (keys::REMOTE_RETRY_MAX_DELAY_MS, "5000"),
    (keys::CONSOLE_MINIMUM_LEVEL, "Information"),
    (keys::CONSOLE_FORMAT, "text"),
    (keys::FLUSH_TIMEOUT_MS, "10000"),
    (keys::APPLICATION_NAME, "logvault"),
];

/// Keys that must be present after assembly.
pub const REQUIRED_KEYS: &[&str] = &[
    keys::REMOTE_INDEX_FORMAT,
    keys::REMOTE_MINIMUM_LEVEL,
    keys::CONSOLE_MINIMUM_LEVEL,
    keys::FLUSH_TIMEOUT_MS,
];

/// Root typed settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub vault: VaultSettings,
    pub logging: LoggingSettings,
    pub application_name: String,
}

/// Secret store connection settings.
#[derive(Debug, Clone)]
pub struct VaultSettings {
    /// `None` when blank: the resolver is then a pure local lookup.
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl VaultSettings {
    /// Secret store settings alone, for the local pass that runs before the
    /// store can be consulted.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, Vec<ValidationError>> {
        let mut v = Validator::new(config);
        let vault = Self::read(&mut v);
        v.finish()?;
        Ok(vault)
    }

    fn read(v: &mut Validator<'_>) -> Self {
        Self {
            endpoint: v.optional_string(keys::VAULT_ENDPOINT),
            token: v.optional_string(keys::VAULT_TOKEN),
            connect_timeout: Duration::from_millis(v.positive(keys::VAULT_CONNECT_TIMEOUT_MS, 5000)),
            request_timeout: Duration::from_millis(v.positive(keys::VAULT_REQUEST_TIMEOUT_MS, 10_000)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub console: ConsoleSettings,
    pub remote: RemoteSettings,
    /// Upper bound for a shutdown flush.
    pub flush_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFormat {
    Text,
    Json,
}

impl std::str::FromStr for ConsoleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(ConsoleFormat::Text),
            "json" => Ok(ConsoleFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub minimum_level: LogLevel,
    pub format: ConsoleFormat,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            minimum_level: LogLevel::Information,
            format: ConsoleFormat::Text,
        }
    }
}

/// Remote indexed sink settings.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Destination address; `None` means local-only logging. Not validated
    /// here: a malformed address omits the remote sink instead of failing
    /// startup.
    pub uri: Option<String>,
    pub index: ChannelPattern,
    pub dead_letter: ChannelPattern,
    pub minimum_level: LogLevel,
    pub auto_register_template: bool,
    pub template_name: String,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Local directory for dead letters the remote store could not take.
    /// Unset means the sink spools under `default_spool_dir()`.
    pub dead_letter_spool: Option<PathBuf>,
}

impl Settings {
    /// Build typed settings, reporting every invalid value at once.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, Vec<ValidationError>> {
        let mut v = Validator::new(config);

        let vault = VaultSettings::read(&mut v);

        let index = ChannelPattern::parse(&v.string(keys::REMOTE_INDEX_FORMAT, "logging-{date}"));
        let dead_letter = match v.optional_string(keys::REMOTE_DEAD_LETTER_FORMAT) {
            Some(raw) => ChannelPattern::parse(&raw),
            None => index.dead_letter(),
        };
        let template_name = v.string(keys::REMOTE_TEMPLATE_NAME, index.base());

        let remote = RemoteSettings {
            uri: v.optional_string(keys::REMOTE_URI),
            minimum_level: v.parsed(keys::REMOTE_MINIMUM_LEVEL, LogLevel::Information),
            auto_register_template: v.parsed(keys::REMOTE_AUTO_REGISTER_TEMPLATE, true),
            template_name,
            batch_size: v.positive(keys::REMOTE_BATCH_SIZE, 50) as usize,
            queue_capacity: v.positive(keys::REMOTE_QUEUE_CAPACITY, 10_000) as usize,
            request_timeout: Duration::from_millis(v.positive(keys::REMOTE_REQUEST_TIMEOUT_MS, 5000)),
            retry: RetryPolicy {
                max_attempts: v.positive(keys::REMOTE_RETRY_MAX_ATTEMPTS, 3) as u32,
                base_delay: Duration::from_millis(v.parsed(keys::REMOTE_RETRY_BASE_DELAY_MS, 200)),
                max_delay: Duration::from_millis(v.parsed(keys::REMOTE_RETRY_MAX_DELAY_MS, 5000)),
            },
            dead_letter_spool: v.optional_string(keys::REMOTE_DEAD_LETTER_SPOOL).map(PathBuf::from),
            index,
            dead_letter,
        };

        let logging = LoggingSettings {
            console: ConsoleSettings {
                minimum_level: v.parsed(keys::CONSOLE_MINIMUM_LEVEL, LogLevel::Information),
                format: v.parsed(keys::CONSOLE_FORMAT, ConsoleFormat::Text),
            },
            remote,
            flush_timeout: Duration::from_millis(v.positive(keys::FLUSH_TIMEOUT_MS, 10_000)),
        };

        let application_name = v.string(keys::APPLICATION_NAME, "logvault");

        v.finish()?;

        Ok(Self { vault, logging, application_name })
    }
}
