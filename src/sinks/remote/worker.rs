//! Background delivery task for a remote sink.
//!
//! # Responsibilities
//! - Drain the sink's queue in FIFO order, in batches
//! - Retry transient failures with the sink's own backoff policy
//! - Hand items that fail for good to the dead-letter route
//! - Acknowledge flush barriers once everything queued before them is handled
//!
//! # Design Decisions
//! - A flush barrier travels through the same queue as events, so an ack
//!   means every earlier event has been delivered or dead-lettered
//! - When a flush times out the sink raises `abandon`; in-flight requests and
//!   backoff sleeps are cut short and remaining events go straight to the
//!   local spool

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::event::LogEvent;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::sinks::remote::transport::{BulkItem, BulkResponse, IndexTransport, ItemFailure, TransportError};
use crate::sinks::remote::Shared;

pub(crate) enum Command {
    Deliver(Arc<LogEvent>),
    Flush(oneshot::Sender<()>),
}

enum Failure {
    Abandoned,
    Transport(TransportError),
}

pub(crate) struct Worker {
    pub(crate) rx: mpsc::Receiver<Command>,
    pub(crate) transport: Arc<dyn IndexTransport>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) abandon: watch::Receiver<bool>,
    pub(crate) batch_size: usize,
    pub(crate) retry: RetryPolicy,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        while let Some(first) = self.rx.recv().await {
            let mut batch = Vec::new();
            let mut barrier = None;

            match first {
                Command::Deliver(event) => batch.push(event),
                Command::Flush(ack) => barrier = Some(ack),
            }

            while barrier.is_none() && batch.len() < self.batch_size {
                match self.rx.try_recv() {
                    Ok(Command::Deliver(event)) => batch.push(event),
                    Ok(Command::Flush(ack)) => barrier = Some(ack),
                    Err(_) => break,
                }
            }

            if !batch.is_empty() {
                let count = batch.len();
                self.ship(batch).await;
                self.shared.pending.fetch_sub(count, Ordering::AcqRel);
            }

            if let Some(ack) = barrier {
                let _ = ack.send(());
            }
        }

        tracing::debug!(sink = %self.shared.name, "remote sink worker stopped");
    }

    async fn ship(&mut self, batch: Vec<Arc<LogEvent>>) {
        let items: Vec<BulkItem> = batch
            .iter()
            .map(|event| BulkItem {
                channel: self.shared.index.channel_for(event.timestamp().date_naive()),
                document: event.to_document(),
            })
            .collect();

        match self.send_with_retry(&items).await {
            Ok(response) => {
                // Failures outside the batch or reported twice are not ours to count.
                let rejected: BTreeMap<usize, &ItemFailure> = response
                    .failed
                    .iter()
                    .filter(|failure| failure.index < items.len())
                    .map(|failure| (failure.index, failure))
                    .collect();
                metrics::record_delivered(&self.shared.name, items.len().saturating_sub(rejected.len()));
                if rejected.is_empty() {
                    return;
                }

                let records = rejected
                    .values()
                    .map(|failure| {
                        let item = &items[failure.index];
                        self.shared
                            .dead_letter
                            .record(&batch[failure.index], &item.channel, &failure.reason)
                    })
                    .collect();
                tracing::warn!(
                    sink = %self.shared.name,
                    rejected = rejected.len(),
                    "store rejected events; routing them to dead-letter channel"
                );
                self.shared
                    .dead_letter
                    .deliver(Some(self.transport.as_ref()), records)
                    .await;
            }
            Err(Failure::Abandoned) => {
                tracing::warn!(
                    sink = %self.shared.name,
                    count = batch.len(),
                    "flush deadline passed; spooling undelivered events"
                );
                let records = self.records_for(&batch, &items, "flush timeout elapsed before delivery");
                self.shared.dead_letter.deliver(None, records).await;
            }
            Err(Failure::Transport(error)) => {
                tracing::warn!(
                    sink = %self.shared.name,
                    count = batch.len(),
                    error = %error,
                    "delivery failed; routing events to dead-letter channel"
                );
                let records = self.records_for(&batch, &items, &error.to_string());
                let transport = (!self.abandoned()).then_some(self.transport.as_ref());
                self.shared.dead_letter.deliver(transport, records).await;
            }
        }
    }

    fn records_for(
        &self,
        batch: &[Arc<LogEvent>],
        items: &[BulkItem],
        reason: &str,
    ) -> Vec<super::DeadLetterRecord> {
        batch
            .iter()
            .zip(items)
            .map(|(event, item)| self.shared.dead_letter.record(event, &item.channel, reason))
            .collect()
    }

    fn abandoned(&self) -> bool {
        *self.abandon.borrow()
    }

    async fn send_with_retry(&mut self, items: &[BulkItem]) -> Result<BulkResponse, Failure> {
        let mut attempt = 0;
        loop {
            if self.abandoned() {
                return Err(Failure::Abandoned);
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                Ok(_) = self.abandon.wait_for(|abandon| *abandon) => return Err(Failure::Abandoned),
                result = self.transport.bulk(items) => result,
            };

            let error = match result {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            metrics::record_delivery_failure(&self.shared.name);
            if !error.is_retryable() || !self.retry.allows_retry_after(attempt) {
                return Err(Failure::Transport(error));
            }

            let delay = self.retry.delay_after(attempt);
            tracing::debug!(
                sink = %self.shared.name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "bulk request failed; retrying"
            );
            tokio::select! {
                biased;
                Ok(_) = self.abandon.wait_for(|abandon| *abandon) => return Err(Failure::Abandoned),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
