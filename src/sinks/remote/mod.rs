//! Remote indexed sink.
//!
//! # Data Flow
//! ```text
//! emit(event)
//!     → bounded queue (try_send; never blocks the caller)
//!         ↳ full → dead-letter spool immediately
//!     → worker.rs (batch, bulk request, retry with backoff)
//!         ↳ item rejected / retries exhausted → dead_letter.rs
//!     → <index>-yyyy.MM.dd            delivered
//!     → <index>-deadletter-yyyy.MM.dd dead-lettered (or local spool)
//! ```
//!
//! # Failure Policy
//! - Delivery failure: self-logged, never raised to the caller
//! - Template registration failure: self-logged, writes proceed anyway
//! - Persistent failure of an event: the event is dead-lettered

pub mod dead_letter;
pub mod template;
pub mod transport;
mod worker;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::schema::RemoteSettings;
use crate::event::{ChannelPattern, LogEvent, LogLevel};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::sinks::{FlushOutcome, Sink};

pub use dead_letter::{default_spool_dir, DeadLetterRecord, DeadLetterRoute};
pub use template::IndexTemplate;
pub use transport::{BulkItem, BulkResponse, HttpIndexClient, IndexTransport, ItemFailure, TransportError};

use worker::{Command, Worker};

/// State shared between the sink handle and its worker.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) index: ChannelPattern,
    pub(crate) dead_letter: DeadLetterRoute,
    /// Events accepted but not yet delivered or dead-lettered.
    pub(crate) pending: AtomicUsize,
}

/// Construction parameters for a [`RemoteSink`].
#[derive(Debug, Clone)]
pub struct RemoteSinkOptions {
    pub name: String,
    pub index: ChannelPattern,
    pub dead_letter: ChannelPattern,
    pub dead_letter_spool: PathBuf,
    pub minimum_level: LogLevel,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Template to register at start; `None` skips registration.
    pub template: Option<IndexTemplate>,
}

impl RemoteSinkOptions {
    pub fn from_settings(settings: &RemoteSettings) -> Self {
        let template = settings
            .auto_register_template
            .then(|| IndexTemplate::for_pattern(settings.template_name.clone(), &settings.index));

        Self {
            name: "remote".to_string(),
            index: settings.index.clone(),
            dead_letter: settings.dead_letter.clone(),
            dead_letter_spool: settings
                .dead_letter_spool
                .clone()
                .unwrap_or_else(default_spool_dir),
            minimum_level: settings.minimum_level,
            batch_size: settings.batch_size,
            queue_capacity: settings.queue_capacity,
            request_timeout: settings.request_timeout,
            retry: settings.retry,
            template,
        }
    }
}

/// Sink delivering events to a remote index store through a background
/// worker.
pub struct RemoteSink {
    shared: Arc<Shared>,
    minimum_level: LogLevel,
    tx: mpsc::Sender<Command>,
    abandon: watch::Sender<bool>,
    /// How long a timed-out flush waits for the spool hand-off.
    grace: Duration,
}

impl RemoteSink {
    /// Register the index template (if configured) and start the delivery
    /// worker on the current tokio runtime.
    ///
    /// Template registration failures are logged and otherwise ignored.
    pub async fn start(options: RemoteSinkOptions, transport: Arc<dyn IndexTransport>) -> Self {
        if let Some(template) = &options.template {
            register_template(&options.name, transport.as_ref(), template, options.request_timeout).await;
        }

        let shared = Arc::new(Shared {
            name: options.name.clone(),
            index: options.index,
            dead_letter: DeadLetterRoute::new(options.name, options.dead_letter, options.dead_letter_spool),
            pending: AtomicUsize::new(0),
        });

        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let (abandon, abandon_rx) = watch::channel(false);

        let worker = Worker {
            rx,
            transport,
            shared: shared.clone(),
            abandon: abandon_rx,
            batch_size: options.batch_size.max(1),
            retry: options.retry,
        };
        tokio::spawn(worker.run());

        Self {
            shared,
            minimum_level: options.minimum_level,
            tx,
            abandon,
            grace: options.request_timeout,
        }
    }

    pub fn dead_letter(&self) -> &DeadLetterRoute {
        &self.shared.dead_letter
    }

    /// Events accepted but not yet delivered or dead-lettered.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Wait until everything queued so far has been handled.
    async fn barrier(&self, timeout: Duration) -> bool {
        let (ack, done) = oneshot::channel();
        let wait = async {
            self.tx.send(Command::Flush(ack)).await.ok()?;
            done.await.ok()
        };
        matches!(tokio::time::timeout(timeout, wait).await, Ok(Some(())))
    }
}

async fn register_template(
    sink: &str,
    transport: &dyn IndexTransport,
    template: &IndexTemplate,
    timeout: Duration,
) {
    let result = match tokio::time::timeout(timeout, transport.register_template(template)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    };

    match result {
        Ok(()) => tracing::debug!(sink, template = %template.name, "index template registered"),
        Err(error) => {
            metrics::record_template_registration_failure(sink);
            tracing::warn!(
                sink,
                template = %template.name,
                error = %error,
                "index template registration failed; indexing anyway"
            );
        }
    }
}

#[async_trait]
impl Sink for RemoteSink {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn minimum_level(&self) -> LogLevel {
        self.minimum_level
    }

    fn emit(&self, event: Arc<LogEvent>) {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        let error = match self.tx.try_send(Command::Deliver(event)) {
            Ok(()) => {
                metrics::record_event_accepted(&self.shared.name);
                return;
            }
            Err(error) => error,
        };
        self.shared.pending.fetch_sub(1, Ordering::AcqRel);

        let reason = match &error {
            TrySendError::Full(_) => "delivery queue full",
            TrySendError::Closed(_) => "delivery worker stopped",
        };
        if let Command::Deliver(event) = error.into_inner() {
            tracing::warn!(sink = %self.shared.name, reason, "event bypassed delivery queue");
            let channel = self.shared.index.channel_for(event.timestamp().date_naive());
            let record = self.shared.dead_letter.record(&event, &channel, reason);
            self.shared.dead_letter.spool(&[record]);
        }
    }

    async fn flush(&self, timeout: Duration) -> FlushOutcome {
        if self.pending() == 0 {
            return FlushOutcome::Idle;
        }
        if self.barrier(timeout).await {
            return FlushOutcome::Drained;
        }

        tracing::warn!(
            sink = %self.shared.name,
            pending = self.pending(),
            timeout_ms = timeout.as_millis() as u64,
            "flush timed out; diverting remaining events to dead-letter spool"
        );
        self.abandon.send_replace(true);
        let settled = self.barrier(self.grace).await;
        self.abandon.send_replace(false);

        if !settled {
            tracing::error!(
                sink = %self.shared.name,
                pending = self.pending(),
                "events still pending after flush grace period"
            );
        }
        FlushOutcome::TimedOut
    }
}
