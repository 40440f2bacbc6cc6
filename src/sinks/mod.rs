//! Log sinks.
//!
//! # Data Flow
//! ```text
//! Pipeline::emit
//!     → console.rs  (synchronous, always available, fallback of last resort)
//!     → remote/     (bounded queue → background worker → bulk index API)
//!                       ↳ persistent failure → dead-letter channel / spool
//!
//! registry.rs decides which sinks exist from the resolved configuration.
//! ```
//!
//! # Design Decisions
//! - `emit` never blocks on I/O and never reports failure to the caller
//! - Each sink owns its connection, queue and retry state
//! - Severity filtering is per sink

pub mod console;
pub mod registry;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::event::{LogEvent, LogLevel};

pub use console::{ConsoleSink, ConsoleTarget};
pub use registry::SinkRegistry;
pub use remote::RemoteSink;

/// Result of flushing one sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; the call was a no-op.
    Idle,
    /// Every buffered event reached its destination or the dead-letter path.
    Drained,
    /// The timeout elapsed; the remainder was routed to the dead-letter path.
    TimedOut,
}

/// A non-essential sink could not be built.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid remote sink address '{uri}': {reason}")]
    InvalidAddress { uri: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// A log-event destination.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Events below this level are dropped before reaching the sink.
    fn minimum_level(&self) -> LogLevel;

    /// Accept one event. Must not block on I/O and must not fail.
    fn emit(&self, event: Arc<LogEvent>);

    /// Drain buffered events, waiting at most `timeout`.
    ///
    /// Calling it again after a full drain returns [`FlushOutcome::Idle`].
    async fn flush(&self, timeout: Duration) -> FlushOutcome;
}
