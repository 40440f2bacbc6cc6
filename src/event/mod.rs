//! Log event model.
//!
//! # Data Flow
//! ```text
//! application code
//!     → LogEvent (timestamp, level, template, properties, error)
//!     → pipeline enrichment (ambient context, process properties)
//!     → Arc<LogEvent> fanned out to every sink
//!     → remote sinks address it by ChannelPattern + event date
//! ```

pub mod channel;
pub mod level;
pub mod log_event;

pub use channel::ChannelPattern;
pub use level::LogLevel;
pub use log_event::{ErrorInfo, LogEvent};
