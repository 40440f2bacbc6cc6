//! Application-facing logging handle.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::Arc;

use serde_json::Value;

use crate::event::{LogEvent, LogLevel};
use crate::pipeline::Pipeline;

/// Cheap-to-clone handle over a pipeline, carrying its own bound properties.
///
/// Derive narrower loggers with [`Logger::for_context`] or
/// [`Logger::for_module`]; each derived logger adds its properties to every
/// event it writes.
#[derive(Clone)]
pub struct Logger {
    pipeline: Arc<Pipeline>,
    properties: Arc<BTreeMap<String, Value>>,
}

impl Logger {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            properties: Arc::new(BTreeMap::new()),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Logger that attaches `name = value` to everything it writes.
    pub fn for_context(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut properties = (*self.properties).clone();
        properties.insert(name.into(), value.into());
        Self {
            pipeline: self.pipeline.clone(),
            properties: Arc::new(properties),
        }
    }

    /// Logger tagged with a `SourceContext`, usually `module_path!()`.
    pub fn for_module(&self, module: &str) -> Self {
        self.for_context("SourceContext", module)
    }

    pub fn emit(&self, mut event: LogEvent) {
        for (name, value) in self.properties.iter() {
            event.enrich(name, value);
        }
        self.pipeline.emit(event);
    }

    pub fn write(&self, level: LogLevel, template: &str) {
        self.emit(LogEvent::new(level, template));
    }

    pub fn write_with<I, K, V>(&self, level: LogLevel, template: &str, properties: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.emit(LogEvent::new(level, template).with_properties(properties));
    }

    pub fn verbose(&self, template: &str) {
        self.write(LogLevel::Verbose, template);
    }

    pub fn debug(&self, template: &str) {
        self.write(LogLevel::Debug, template);
    }

    pub fn information(&self, template: &str) {
        self.write(LogLevel::Information, template);
    }

    pub fn warning(&self, template: &str) {
        self.write(LogLevel::Warning, template);
    }

    pub fn error(&self, template: &str) {
        self.write(LogLevel::Error, template);
    }

    pub fn fatal(&self, template: &str) {
        self.write(LogLevel::Fatal, template);
    }

    /// Fatal event carrying `error` and its source chain.
    pub fn fatal_with(&self, error: &(dyn StdError + 'static), template: &str) {
        self.emit(LogEvent::new(LogLevel::Fatal, template).with_error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::ConsoleTarget;

    #[test]
    fn test_bound_properties_are_attached() {
        let target = ConsoleTarget::buffer();
        let logger = Logger::new(Arc::new(Pipeline::bootstrap(target.clone())));

        logger
            .for_module("billing::invoices")
            .for_context("Invoice", 42)
            .write_with(LogLevel::Warning, "{SourceContext}: invoice {Invoice} late by {Days}d", [("Days", 3)]);

        assert!(target.contents().contains("WRN] billing::invoices: invoice 42 late by 3d"));
    }

    #[test]
    fn test_fatal_with_error_chain() {
        let target = ConsoleTarget::buffer();
        let logger = Logger::new(Arc::new(Pipeline::bootstrap(target.clone())));
        let error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port 8080 taken");

        logger.fatal_with(&error, "Host terminated unexpectedly");

        let out = target.contents();
        assert!(out.contains("FTL] Host terminated unexpectedly"));
        assert!(out.contains("port 8080 taken"));
    }

    #[test]
    fn test_below_threshold_dropped() {
        let target = ConsoleTarget::buffer();
        let logger = Logger::new(Arc::new(Pipeline::bootstrap(target.clone())));

        logger.debug("noise");
        logger.information("signal");

        assert_eq!(target.contents().lines().count(), 1);
    }
}
