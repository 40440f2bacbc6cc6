//! Configuration resolution and structured log delivery for long-running
//! server processes.
//!
//! # Data Flow
//! ```text
//! lifecycle::Bootstrapper
//!     → config::Assembler (defaults < file < environment < secret store)
//!         → secrets::SecretResolver (one-level SecretRef)
//!     → sinks::SinkRegistry (console always, remote when configured)
//!     → pipeline::Pipeline (enrich, per-sink threshold, fan-out)
//!     → application body (receives a pipeline::Logger)
//!     → flush on every exit path
//! ```

// Configuration
pub mod config;
pub mod secrets;

// Delivery
pub mod event;
pub mod pipeline;
pub mod sinks;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::{ConfigError, ConfigKey, ResolvedConfig, Settings};
pub use event::{LogEvent, LogLevel};
pub use lifecycle::{AppContext, AppError, BootstrapOptions, Bootstrapper, Phase, Shutdown};
pub use pipeline::{Logger, Pipeline};
pub use sinks::{FlushOutcome, Sink};
