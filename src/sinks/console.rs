//! Local console sink.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::schema::{ConsoleFormat, ConsoleSettings};
use crate::event::{LogEvent, LogLevel};
use crate::observability::metrics;
use crate::sinks::{FlushOutcome, Sink};

/// Where console output goes.
#[derive(Debug, Clone)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
    /// In-memory buffer, for tests and embedding hosts that capture output.
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl ConsoleTarget {
    pub fn buffer() -> Self {
        ConsoleTarget::Buffer(Arc::new(Mutex::new(Vec::new())))
    }

    /// Captured text of a `Buffer` target; empty for real streams.
    pub fn contents(&self) -> String {
        match self {
            ConsoleTarget::Buffer(buf) => {
                let buf = buf.lock().unwrap_or_else(PoisonError::into_inner);
                String::from_utf8_lossy(&buf).into_owned()
            }
            _ => String::new(),
        }
    }

    /// Write one complete line while holding the stream's lock, so lines
    /// from concurrent producers never interleave.
    fn write_line(&self, line: &str) -> io::Result<()> {
        match self {
            ConsoleTarget::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")
            }
            ConsoleTarget::Stderr => {
                let mut out = io::stderr().lock();
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")
            }
            ConsoleTarget::Buffer(buf) => {
                let mut buf = buf.lock().unwrap_or_else(PoisonError::into_inner);
                buf.extend_from_slice(line.as_bytes());
                buf.push(b'\n');
                Ok(())
            }
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self {
            ConsoleTarget::Stdout => io::stdout().flush(),
            ConsoleTarget::Stderr => io::stderr().flush(),
            ConsoleTarget::Buffer(_) => Ok(()),
        }
    }
}

/// Synchronous sink writing one line per event.
pub struct ConsoleSink {
    name: String,
    minimum_level: LogLevel,
    format: ConsoleFormat,
    target: ConsoleTarget,
    dirty: AtomicBool,
}

impl ConsoleSink {
    pub fn new(settings: &ConsoleSettings, target: ConsoleTarget) -> Self {
        Self {
            name: "console".to_string(),
            minimum_level: settings.minimum_level,
            format: settings.format,
            target,
            dirty: AtomicBool::new(false),
        }
    }

    /// Console sink used before configuration exists.
    pub fn bootstrap(target: ConsoleTarget) -> Self {
        let mut sink = Self::new(&ConsoleSettings::default(), target);
        sink.name = "bootstrap-console".to_string();
        sink
    }

    fn format(&self, event: &LogEvent) -> String {
        match self.format {
            ConsoleFormat::Json => event.to_document().to_string(),
            ConsoleFormat::Text => {
                let mut line = format!(
                    "[{} {}] {}",
                    event.timestamp().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                    event.level().short_code(),
                    event.render_message()
                );
                if let Some(error) = event.error() {
                    line.push('\n');
                    line.push_str(&error.message);
                    for cause in &error.causes {
                        line.push_str("\n  caused by: ");
                        line.push_str(cause);
                    }
                }
                line
            }
        }
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    fn emit(&self, event: Arc<LogEvent>) {
        let line = self.format(&event);
        match self.target.write_line(&line) {
            Ok(()) => {
                self.dirty.store(true, Ordering::Release);
                metrics::record_event_accepted(&self.name);
            }
            Err(e) => {
                tracing::warn!(sink = %self.name, error = %e, "console write failed");
                metrics::record_dropped(&self.name, 1);
            }
        }
    }

    async fn flush(&self, _timeout: Duration) -> FlushOutcome {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return FlushOutcome::Idle;
        }
        if let Err(e) = self.target.flush() {
            tracing::warn!(sink = %self.name, error = %e, "console flush failed");
        }
        FlushOutcome::Drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ErrorInfo;

    #[test]
    fn test_text_line() {
        let target = ConsoleTarget::buffer();
        let sink = ConsoleSink::new(&ConsoleSettings::default(), target.clone());

        sink.emit(Arc::new(
            LogEvent::new(LogLevel::Information, "Hello {Name}").with_property("Name", "world"),
        ));

        let out = target.contents();
        assert!(out.contains("INF] Hello world"), "got: {out}");
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_error_chain_printed() {
        let target = ConsoleTarget::buffer();
        let sink = ConsoleSink::new(&ConsoleSettings::default(), target.clone());

        let info = ErrorInfo {
            message: "host failed".into(),
            causes: vec!["port in use".into()],
        };
        sink.emit(Arc::new(LogEvent::new(LogLevel::Fatal, "down").with_error_info(info)));

        let out = target.contents();
        assert!(out.contains("FTL] down\nhost failed\n  caused by: port in use"));
    }

    #[test]
    fn test_json_line() {
        let target = ConsoleTarget::buffer();
        let settings = ConsoleSettings {
            minimum_level: LogLevel::Verbose,
            format: ConsoleFormat::Json,
        };
        let sink = ConsoleSink::new(&settings, target.clone());

        sink.emit(Arc::new(LogEvent::new(LogLevel::Debug, "tick")));

        let doc: serde_json::Value = serde_json::from_str(target.contents().trim()).unwrap();
        assert_eq!(doc["level"], "Debug");
        assert_eq!(doc["message"], "tick");
    }

    #[tokio::test]
    async fn test_flush_is_idempotent() {
        let sink = ConsoleSink::bootstrap(ConsoleTarget::buffer());
        assert_eq!(sink.flush(Duration::from_secs(1)).await, FlushOutcome::Idle);

        sink.emit(Arc::new(LogEvent::new(LogLevel::Information, "x")));
        assert_eq!(sink.flush(Duration::from_secs(1)).await, FlushOutcome::Drained);
        assert_eq!(sink.flush(Duration::from_secs(1)).await, FlushOutcome::Idle);
    }
}
