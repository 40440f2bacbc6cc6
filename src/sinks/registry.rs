//! Sink construction from resolved configuration.

use std::sync::Arc;

use crate::config::schema::LoggingSettings;
use crate::config::{ConfigError, ResolvedConfig, Settings};
use crate::sinks::console::{ConsoleSink, ConsoleTarget};
use crate::sinks::remote::{HttpIndexClient, RemoteSink, RemoteSinkOptions};
use crate::sinks::{Sink, SinkError};

/// Builds the ordered sink list for a pipeline.
///
/// The console sink is always first. The remote sink follows when its address
/// is configured and usable; otherwise it is left out and logging continues
/// locally.
#[derive(Debug, Clone)]
pub struct SinkRegistry {
    console: ConsoleTarget,
}

impl SinkRegistry {
    pub fn new(console: ConsoleTarget) -> Self {
        Self { console }
    }

    /// Build sinks from a resolved snapshot. Only invalid setting values are
    /// errors; an unusable remote address is not.
    pub async fn build(&self, config: &ResolvedConfig) -> Result<Vec<Arc<dyn Sink>>, ConfigError> {
        let settings = Settings::from_config(config).map_err(ConfigError::Validation)?;
        Ok(self.build_from_settings(&settings.logging).await)
    }

    pub async fn build_from_settings(&self, settings: &LoggingSettings) -> Vec<Arc<dyn Sink>> {
        let mut sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(ConsoleSink::new(&settings.console, self.console.clone()))];

        match self.remote(settings).await {
            Ok(Some(remote)) => sinks.push(remote),
            Ok(None) => tracing::info!("no remote log destination configured; logging locally only"),
            Err(error) => tracing::warn!(error = %error, "remote sink omitted; logging locally only"),
        }
        sinks
    }

    async fn remote(&self, settings: &LoggingSettings) -> Result<Option<Arc<dyn Sink>>, SinkError> {
        let Some(uri) = settings.remote.uri.as_deref() else {
            return Ok(None);
        };

        let client = HttpIndexClient::new(uri, settings.remote.request_timeout)?;
        tracing::debug!(base = %client.base(), index = %settings.remote.index, "building remote sink");

        let options = RemoteSinkOptions::from_settings(&settings.remote);
        let sink = RemoteSink::start(options, Arc::new(client)).await;
        Ok(Some(Arc::new(sink)))
    }
}
