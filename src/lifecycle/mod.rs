//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Starting: bootstrap console pipeline → assemble config → build sinks
//!     Running:  full pipeline installed → application body
//!     Stopped | Fatal: record outcome → flush → exit code
//!
//! Shutdown (shutdown.rs):
//!     Shutdown broadcast → application body returns
//!     FlushGuard → pipeline flushed on release or drop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - Ordered startup: configuration first, sinks second, application last
//! - Every exit path flushes, including configuration failure and panics
//! - Flush has a timeout: undelivered events go to the dead-letter path

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{FlushGuard, Shutdown};
pub use signals::{wait_for_shutdown_signal, ShutdownSignal};
pub use startup::{
    load_configuration, AppContext, AppError, BootstrapError, BootstrapOptions, Bootstrapper, Phase,
    FATAL_MESSAGE,
};
