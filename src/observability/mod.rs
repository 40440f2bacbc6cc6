//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline and sinks produce:
//!     → logging.rs (self-diagnostics via tracing, stderr)
//!     → metrics.rs (counters through the metrics facade)
//!
//! Application events never travel this path; they go through the
//! pipeline. Keeping the two apart means a failing remote sink can report
//! itself without feeding its own queue.
//! ```

pub mod logging;
pub mod metrics;
