//! Log pipeline.
//!
//! # Data Flow
//! ```text
//! Logger::write / Pipeline::emit(event)
//!     → context.rs   (ambient scope properties, process enrichers)
//!     → Arc<LogEvent>
//!     → for each sink: level >= sink threshold?
//!         → sink.emit (isolated: a panicking sink is skipped, others proceed)
//!
//! Pipeline::flush
//!     → every sink flushed concurrently, each bounded by flush_timeout
//! ```
//!
//! # Design Decisions
//! - The pipeline is an explicit handle (`Arc<Pipeline>`), never a global
//! - `emit` takes no lock of its own; concurrency is each sink's concern
//! - Severity filtering is per sink, there is no global threshold

pub mod context;
pub mod logger;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::event::LogEvent;
use crate::sinks::{ConsoleSink, ConsoleTarget, FlushOutcome, Sink};

pub use context::{Enricher, PropertyEnricher};
pub use logger::Logger;

const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans events out to a fixed set of sinks.
pub struct Pipeline {
    sinks: Vec<Arc<dyn Sink>>,
    enrichers: Vec<Arc<dyn Enricher>>,
    flush_timeout: Duration,
}

/// Per-sink result of [`Pipeline::flush`], in sink order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub outcomes: Vec<(String, FlushOutcome)>,
}

impl FlushReport {
    /// True when no sink had anything buffered.
    pub fn is_idle(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| *o == FlushOutcome::Idle)
    }

    /// Sinks whose flush hit the timeout.
    pub fn timed_out(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == FlushOutcome::TimedOut)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    sinks: Vec<Arc<dyn Sink>>,
    enrichers: Vec<Arc<dyn Enricher>>,
    flush_timeout: Option<Duration>,
}

impl PipelineBuilder {
    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sinks(mut self, sinks: impl IntoIterator<Item = Arc<dyn Sink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    pub fn enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enrichers.push(enricher);
        self
    }

    pub fn enrichers(mut self, enrichers: impl IntoIterator<Item = Arc<dyn Enricher>>) -> Self {
        self.enrichers.extend(enrichers);
        self
    }

    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            sinks: self.sinks,
            enrichers: self.enrichers,
            flush_timeout: self.flush_timeout.unwrap_or(DEFAULT_FLUSH_TIMEOUT),
        }
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Console-only pipeline used before configuration is available.
    pub fn bootstrap(console: ConsoleTarget) -> Self {
        Self::builder()
            .sink(Arc::new(ConsoleSink::bootstrap(console)))
            .build()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn flush_timeout(&self) -> Duration {
        self.flush_timeout
    }

    /// Enrich the event and hand it to every sink whose threshold it meets.
    ///
    /// Never blocks on I/O and never fails.
    pub fn emit(&self, mut event: LogEvent) {
        if let Some(ambient) = context::current() {
            for (name, value) in ambient.iter() {
                event.enrich(name, value);
            }
        }
        for enricher in &self.enrichers {
            enricher.enrich(&mut event);
        }

        let event = Arc::new(event);
        for sink in &self.sinks {
            if event.level() < sink.minimum_level() {
                continue;
            }
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| sink.emit(Arc::clone(&event))));
            if delivered.is_err() {
                tracing::error!(sink = %sink.name(), "sink panicked while accepting an event");
            }
        }
    }

    /// Drain every sink, each bounded by the pipeline's flush timeout.
    ///
    /// Safe to call repeatedly; once drained, further calls report `Idle`.
    pub async fn flush(&self) -> FlushReport {
        let timeout = self.flush_timeout;
        let outcomes = join_all(self.sinks.iter().map(|sink| async move {
            (sink.name().to_string(), sink.flush(timeout).await)
        }))
        .await;

        let report = FlushReport { outcomes };
        for name in report.timed_out() {
            tracing::warn!(sink = name, timeout_ms = timeout.as_millis() as u64, "sink flush timed out");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ConsoleSettings;
    use crate::event::LogLevel;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        events: Mutex<Vec<Arc<LogEvent>>>,
        threshold: Option<LogLevel>,
    }

    #[async_trait]
    impl Sink for Collecting {
        fn name(&self) -> &str {
            "collecting"
        }

        fn minimum_level(&self) -> LogLevel {
            self.threshold.unwrap_or(LogLevel::Verbose)
        }

        fn emit(&self, event: Arc<LogEvent>) {
            self.events.lock().unwrap().push(event);
        }

        async fn flush(&self, _timeout: Duration) -> FlushOutcome {
            FlushOutcome::Idle
        }
    }

    struct Panicking;

    #[async_trait]
    impl Sink for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn minimum_level(&self) -> LogLevel {
            LogLevel::Verbose
        }

        fn emit(&self, _event: Arc<LogEvent>) {
            panic!("sink exploded");
        }

        async fn flush(&self, _timeout: Duration) -> FlushOutcome {
            FlushOutcome::Idle
        }
    }

    #[test]
    fn test_threshold_is_per_sink() {
        let strict = Arc::new(Collecting { threshold: Some(LogLevel::Error), ..Default::default() });
        let lenient = Arc::new(Collecting::default());
        let pipeline = Pipeline::builder().sink(strict.clone()).sink(lenient.clone()).build();

        pipeline.emit(LogEvent::new(LogLevel::Information, "routine"));
        pipeline.emit(LogEvent::new(LogLevel::Error, "bad"));

        assert_eq!(strict.events.lock().unwrap().len(), 1);
        assert_eq!(lenient.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_panicking_sink_does_not_block_others() {
        let survivor = Arc::new(Collecting::default());
        let pipeline = Pipeline::builder()
            .sink(Arc::new(Panicking))
            .sink(survivor.clone())
            .build();

        pipeline.emit(LogEvent::new(LogLevel::Warning, "still here"));

        assert_eq!(survivor.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ambient_and_enricher_properties() {
        let sink = Arc::new(Collecting::default());
        let pipeline = Pipeline::builder()
            .sink(sink.clone())
            .enricher(Arc::new(PropertyEnricher::new("Application", "svc")))
            .build();

        context::scope([("RequestId", "abc"), ("Application", "scoped")], async {
            pipeline.emit(LogEvent::new(LogLevel::Information, "in scope").with_property("RequestId", "own"));
        })
        .await;

        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].property("RequestId").unwrap(), "own");
        assert_eq!(events[0].property("Application").unwrap(), "scoped");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_keep_their_order() {
        let target = ConsoleTarget::buffer();
        let pipeline = Arc::new(
            Pipeline::builder()
                .sink(Arc::new(ConsoleSink::new(&ConsoleSettings::default(), target.clone())))
                .build(),
        );

        let producers: Vec<_> = (0..8)
            .map(|p| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    for i in 0..50 {
                        pipeline.emit(
                            LogEvent::new(LogLevel::Information, "p{P} e{I}")
                                .with_property("P", p)
                                .with_property("I", i),
                        );
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        let output = target.contents();
        assert_eq!(output.lines().count(), 400);
        for p in 0..8 {
            let seen: Vec<u32> = output
                .lines()
                .filter_map(|line| line.split("] ").nth(1))
                .filter_map(|msg| msg.strip_prefix(&format!("p{p} e")))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..50).collect::<Vec<u32>>(), "producer {p} out of order");
        }
    }

    #[tokio::test]
    async fn test_flush_twice_is_idle_second_time() {
        let target = ConsoleTarget::buffer();
        let pipeline = Pipeline::bootstrap(target.clone());

        pipeline.emit(LogEvent::new(LogLevel::Information, "hello"));
        let first = pipeline.flush().await;
        let second = pipeline.flush().await;

        assert_eq!(first.outcomes, vec![("bootstrap-console".to_string(), FlushOutcome::Drained)]);
        assert!(second.is_idle());
        assert_eq!(target.contents().lines().count(), 1);
    }
}
