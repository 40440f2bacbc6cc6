//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote sink batch delivery:
//!     → retries.rs (is another attempt allowed?)
//!     → backoff.rs (how long to wait before it)
//!     → attempts exhausted: batch goes to the dead-letter route
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Jittered backoff prevents thundering herd against a recovering store

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
