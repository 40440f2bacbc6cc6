//! Dead-letter routing for events a remote store would not take.
//!
//! # Responsibilities
//! - Wrap an undeliverable event in a [`DeadLetterRecord`] addressed to the
//!   dated dead-letter channel
//! - Write records to the remote dead-letter channel, falling back to a local
//!   spool file per channel when the store itself is unreachable
//!
//! Every route has a spool directory. When none is configured the records go
//! under [`default_spool_dir`]. Records are write-only: nothing in this crate
//! reads them back.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::event::{ChannelPattern, LogEvent, LogLevel};
use crate::observability::metrics;
use crate::sinks::remote::transport::{BulkItem, IndexTransport};

/// An event that could not be delivered to its intended channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetterRecord {
    /// Dead-letter channel this record belongs to.
    #[serde(skip)]
    pub channel: String,
    #[serde(rename = "@timestamp")]
    pub recorded_at: DateTime<Utc>,
    pub level: LogLevel,
    #[serde(rename = "originalChannel")]
    pub original_channel: String,
    pub reason: String,
    /// The original event document.
    pub event: Value,
}

/// Spool directory used when `logging.remote.dead_letter_spool` is unset.
pub fn default_spool_dir() -> PathBuf {
    std::env::temp_dir().join("logvault").join("deadletter")
}

struct Spool {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl Spool {
    fn path_for(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{channel}.jsonl"))
    }

    fn append(&self, channel: &str, records: &[&DeadLetterRecord]) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(channel))?;

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }
        file.write_all(&buf)?;
        file.flush()
    }
}

/// Where a remote sink sends events it gives up on.
pub struct DeadLetterRoute {
    sink_name: String,
    pattern: ChannelPattern,
    spool: Spool,
}

impl DeadLetterRoute {
    pub fn new(sink_name: impl Into<String>, pattern: ChannelPattern, spool_dir: PathBuf) -> Self {
        Self {
            sink_name: sink_name.into(),
            pattern,
            spool: Spool { dir: spool_dir, lock: Mutex::new(()) },
        }
    }

    pub fn pattern(&self) -> &ChannelPattern {
        &self.pattern
    }

    /// Spool file for a dead-letter channel.
    pub fn spool_path(&self, channel: &str) -> PathBuf {
        self.spool.path_for(channel)
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool.dir
    }

    /// Wrap `event`, addressing it to today's dead-letter channel.
    pub fn record(&self, event: &LogEvent, original_channel: &str, reason: &str) -> DeadLetterRecord {
        let now = Utc::now();
        DeadLetterRecord {
            channel: self.pattern.channel_for(now.date_naive()),
            recorded_at: now,
            level: event.level(),
            original_channel: original_channel.to_string(),
            reason: reason.to_string(),
            event: event.to_document(),
        }
    }

    /// Deliver records: one attempt against the remote dead-letter channel
    /// when `transport` is given, then the local spool for whatever is left.
    pub async fn deliver(&self, transport: Option<&dyn IndexTransport>, records: Vec<DeadLetterRecord>) {
        if records.is_empty() {
            return;
        }

        let Some(transport) = transport else {
            self.spool(&records);
            return;
        };

        let items: Vec<BulkItem> = records
            .iter()
            .map(|r| BulkItem {
                channel: r.channel.clone(),
                document: serde_json::to_value(r).unwrap_or(Value::Null),
            })
            .collect();

        match transport.bulk(&items).await {
            Ok(response) if response.failed.is_empty() => {
                metrics::record_dead_lettered(&self.sink_name, records.len());
            }
            Ok(response) => {
                let failed: Vec<DeadLetterRecord> = response
                    .failed
                    .iter()
                    .filter_map(|f| records.get(f.index).cloned())
                    .collect();
                tracing::warn!(
                    sink = %self.sink_name,
                    rejected = failed.len(),
                    "dead-letter channel rejected records"
                );
                metrics::record_dead_lettered(&self.sink_name, records.len().saturating_sub(failed.len()));
                self.spool(&failed);
            }
            Err(error) => {
                tracing::warn!(
                    sink = %self.sink_name,
                    error = %error,
                    count = records.len(),
                    "dead-letter channel unreachable"
                );
                self.spool(&records);
            }
        }
    }

    /// Append records to the local spool. Returns how many were written.
    pub fn spool(&self, records: &[DeadLetterRecord]) -> usize {
        let spool = &self.spool;
        let mut by_channel: BTreeMap<&str, Vec<&DeadLetterRecord>> = BTreeMap::new();
        for record in records {
            by_channel.entry(record.channel.as_str()).or_default().push(record);
        }

        let mut written = 0;
        for (channel, batch) in by_channel {
            match spool.append(channel, &batch) {
                Ok(()) => written += batch.len(),
                Err(error) => {
                    tracing::error!(
                        sink = %self.sink_name,
                        path = %spool.path_for(channel).display(),
                        error = %error,
                        count = batch.len(),
                        "dead-letter spool write failed; events lost"
                    );
                    metrics::record_dropped(&self.sink_name, batch.len());
                }
            }
        }
        metrics::record_dead_lettered(&self.sink_name, written);
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::remote::transport::{BulkResponse, TransportError};
    use crate::sinks::remote::template::IndexTemplate;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct Recording {
        items: StdMutex<Vec<BulkItem>>,
        fail: bool,
    }

    #[async_trait]
    impl IndexTransport for Recording {
        async fn register_template(&self, _template: &IndexTemplate) -> Result<(), TransportError> {
            Ok(())
        }

        async fn bulk(&self, items: &[BulkItem]) -> Result<BulkResponse, TransportError> {
            if self.fail {
                return Err(TransportError::Connect("refused".into()));
            }
            self.items.lock().unwrap().extend_from_slice(items);
            Ok(BulkResponse::default())
        }
    }

    fn route(spool: &Path) -> DeadLetterRoute {
        DeadLetterRoute::new("remote", ChannelPattern::parse("app-{date}").dead_letter(), spool.to_path_buf())
    }

    #[test]
    fn test_record_addressed_to_today() {
        let dir = tempfile::tempdir().unwrap();
        let route = route(dir.path());
        let event = LogEvent::new(LogLevel::Error, "boom");
        let record = route.record(&event, "app-2026.10.19", "mapping error");

        let today = Utc::now().date_naive().format("%Y.%m.%d").to_string();
        assert_eq!(record.channel, format!("app-deadletter-{today}"));
        assert_eq!(record.event["message"], "boom");
    }

    #[tokio::test]
    async fn test_remote_dead_letter_channel_used_first() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Recording { items: StdMutex::new(Vec::new()), fail: false };
        let route = route(dir.path());
        let record = route.record(&LogEvent::new(LogLevel::Error, "x"), "app-1", "rejected");
        let channel = record.channel.clone();

        route.deliver(Some(&transport), vec![record]).await;

        let items = transport.items.lock().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].channel, channel);
        assert_eq!(items[0].document["reason"], "rejected");
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_spool() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Recording { items: StdMutex::new(Vec::new()), fail: true };
        let route = route(dir.path());
        let record = route.record(&LogEvent::new(LogLevel::Warning, "lost?"), "app-1", "unreachable");
        let path = route.spool_path(&record.channel);

        route.deliver(Some(&transport), vec![record]).await;

        let content = std::fs::read_to_string(path).unwrap();
        let line: Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["event"]["message"], "lost?");
        assert_eq!(line["originalChannel"], "app-1");
    }

    #[test]
    fn test_spool_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let route = route(&dir.path().join("nested").join("spool"));
        let record = route.record(&LogEvent::new(LogLevel::Warning, "x"), "app-1", "r");
        let path = route.spool_path(&record.channel);

        assert_eq!(route.spool(&[record]), 1);
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_spool_reports_zero() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let route = route(file.path());
        let record = route.record(&LogEvent::new(LogLevel::Warning, "x"), "app-1", "r");
        assert_eq!(route.spool(&[record]), 0);
    }

    #[test]
    fn test_default_spool_dir_is_stable() {
        assert_eq!(default_spool_dir(), default_spool_dir());
        assert!(default_spool_dir().ends_with("deadletter"));
    }
}
