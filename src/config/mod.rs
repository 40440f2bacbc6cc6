//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)            lowest precedence
//!     → config file (TOML, flattened to dotted keys)
//!     → environment (LOGVAULT_ prefix, `__` between levels)
//!     → secret store (every listed secret)   highest precedence
//!     → assembler.rs (merge, one-level SecretRef dereference, required keys)
//!     → ResolvedConfig (immutable, shared by clone)
//!     → schema.rs Settings (typed, all invalid values reported at once)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once assembled; there is no live refresh
//! - Keys are case-insensitive and normalised on construction
//! - Assembly fails before any sink exists, never leaving a half-built pipeline

pub mod assembler;
pub mod key;
pub mod loader;
pub mod resolved;
pub mod schema;
pub mod validation;

pub use assembler::{Assembler, SecretRef};
pub use key::{ConfigKey, InvalidKey};
pub use loader::{ConfigError, ConfigSource, DefaultsSource, EnvSource, FileSource, MemorySource};
pub use resolved::{ConfigLayer, ResolvedConfig};
pub use schema::{keys, ConsoleFormat, ConsoleSettings, LoggingSettings, RemoteSettings, Settings, VaultSettings};
pub use validation::ValidationError;
