//! Ambient properties attached to events at emission time.
//!
//! Two sources feed enrichment:
//! - a task-scoped property set pushed with [`scope`], typically carrying
//!   correlation identifiers for one request or job
//! - process-wide [`Enricher`]s registered on the pipeline
//!
//! Properties already on the event always win over both.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::event::LogEvent;

pub type Properties = BTreeMap<String, Value>;

tokio::task_local! {
    static LOG_CONTEXT: Arc<Properties>;
}

/// Run `future` with `properties` pushed onto the ambient log context.
///
/// Scopes nest: inner properties shadow outer ones with the same name. The
/// context does not follow `tokio::spawn`; wrap the spawned future in its own
/// scope to carry it across.
pub async fn scope<F, I, K, V>(properties: I, future: F) -> F::Output
where
    F: Future,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    LOG_CONTEXT.scope(merged(properties), future).await
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<R, I, K, V>(properties: I, f: impl FnOnce() -> R) -> R
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    LOG_CONTEXT.sync_scope(merged(properties), f)
}

/// Snapshot of the current ambient context, if any scope is active.
pub fn current() -> Option<Arc<Properties>> {
    LOG_CONTEXT.try_with(Arc::clone).ok()
}

fn merged<I, K, V>(properties: I) -> Arc<Properties>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let mut combined = current().map(|outer| (*outer).clone()).unwrap_or_default();
    for (name, value) in properties {
        combined.insert(name.into(), value.into());
    }
    Arc::new(combined)
}

/// Adds properties to every event passing through a pipeline.
pub trait Enricher: Send + Sync {
    fn enrich(&self, event: &mut LogEvent);
}

/// Attaches one fixed property.
#[derive(Debug, Clone)]
pub struct PropertyEnricher {
    name: String,
    value: Value,
}

impl PropertyEnricher {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Enricher for PropertyEnricher {
    fn enrich(&self, event: &mut LogEvent) {
        event.enrich(&self.name, &self.value);
    }
}

/// `Application`, `ProcessId`, `MachineName` and a fresh `RunId`.
pub fn process_enrichers(application: &str) -> Vec<Arc<dyn Enricher>> {
    vec![
        Arc::new(PropertyEnricher::new("Application", application)),
        Arc::new(PropertyEnricher::new("ProcessId", std::process::id())),
        Arc::new(PropertyEnricher::new("MachineName", machine_name())),
        Arc::new(PropertyEnricher::new("RunId", Uuid::new_v4().to_string())),
    ]
}

fn machine_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
