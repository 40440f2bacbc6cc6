//! Shutdown coordination and guaranteed pipeline flush.

use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::broadcast;

use crate::pipeline::{FlushReport, Pipeline};

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that the application body and its tasks can
/// subscribe to.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the active pipeline and flushes it when released or dropped.
///
/// [`FlushGuard::release`] is the normal path. If the guard is dropped
/// instead (early return, unwinding), `Drop` flushes as well as the current
/// runtime allows.
pub struct FlushGuard {
    pipeline: Option<Arc<Pipeline>>,
}

impl FlushGuard {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline: Some(pipeline) }
    }

    /// The guarded pipeline; `None` only after release.
    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.pipeline.as_ref()
    }

    /// Install `next` and flush the pipeline it replaces.
    pub async fn replace(&mut self, next: Arc<Pipeline>) -> Option<FlushReport> {
        let previous = self.pipeline.replace(next)?;
        Some(previous.flush().await)
    }

    /// Flush and give up the pipeline.
    pub async fn release(mut self) -> Option<FlushReport> {
        let pipeline = self.pipeline.take()?;
        Some(pipeline.flush().await)
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let Some(pipeline) = self.pipeline.take() else {
            return;
        };

        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(pipeline.flush()));
            }
            Ok(handle) => {
                tracing::warn!("flush guard dropped on a current-thread runtime; flushing in the background");
                handle.spawn(async move {
                    pipeline.flush().await;
                });
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    runtime.block_on(pipeline.flush());
                }
                Err(error) => {
                    tracing::error!(error = %error, "no runtime available to flush log pipeline");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogEvent, LogLevel};
    use crate::sinks::{ConsoleTarget, FlushOutcome};

    #[tokio::test]
    async fn test_replace_flushes_previous() {
        let first = Arc::new(Pipeline::bootstrap(ConsoleTarget::buffer()));
        let mut guard = FlushGuard::new(first.clone());

        first.emit(LogEvent::new(LogLevel::Information, "bootstrap"));
        let report = guard
            .replace(Arc::new(Pipeline::bootstrap(ConsoleTarget::buffer())))
            .await
            .unwrap();

        assert_eq!(report.outcomes[0].1, FlushOutcome::Drained);
        assert!(!Arc::ptr_eq(guard.pipeline().unwrap(), &first));
    }

    #[tokio::test]
    async fn test_release_then_drop_flushes_once() {
        let pipeline = Arc::new(Pipeline::bootstrap(ConsoleTarget::buffer()));
        pipeline.emit(LogEvent::new(LogLevel::Information, "x"));

        let report = FlushGuard::new(pipeline.clone()).release().await.unwrap();
        assert!(!report.is_idle());
        assert!(pipeline.flush().await.is_idle());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drop_flushes_on_multi_thread_runtime() {
        let pipeline = Arc::new(Pipeline::bootstrap(ConsoleTarget::buffer()));
        pipeline.emit(LogEvent::new(LogLevel::Information, "x"));

        drop(FlushGuard::new(pipeline.clone()));

        assert!(pipeline.flush().await.is_idle());
    }

    #[test]
    fn test_shutdown_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        shutdown.clone().trigger();
        assert!(rx.try_recv().is_ok());
    }
}
