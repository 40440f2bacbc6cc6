//! Process bootstrap.
//!
//! # Responsibilities
//! - Log through a console-only pipeline until configuration exists
//! - Assemble configuration: local layers, then the secret store if one is
//!   configured, then the one-level log destination reference
//! - Build the full pipeline and hand it to the application body
//! - Record any failure at `Fatal` and flush on every exit path
//!
//! # Design Decisions
//! - Configuration errors are fatal and surface on the bootstrap console
//! - Sink construction problems are not; the registry degrades instead
//! - The application body runs in its own task so a panic is observed as a
//!   failed join instead of tearing down the bootstrapper

use std::error::Error as StdError;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, watch};

use crate::config::schema::{keys, REQUIRED_KEYS};
use crate::config::{
    Assembler, ConfigError, ConfigKey, ConfigSource, DefaultsSource, MemorySource, ResolvedConfig,
    SecretRef, Settings, VaultSettings,
};
use crate::lifecycle::shutdown::{FlushGuard, Shutdown};
use crate::pipeline::context::process_enrichers;
use crate::pipeline::{Logger, Pipeline};
use crate::secrets::{HttpSecretStore, SecretStore, SecretStoreSource};
use crate::sinks::{ConsoleTarget, SinkRegistry};

/// Error type the application body returns.
pub type AppError = Box<dyn StdError + Send + Sync>;

/// Message recorded for every fatal exit.
pub const FATAL_MESSAGE: &str = "Host terminated unexpectedly";

/// Lifecycle phase of the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Running,
    Stopped,
    Fatal,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Stopped | Phase::Fatal)
    }

    /// Process exit status for a terminal phase.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Phase::Fatal => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration could not be assembled")]
    Configuration(#[from] ConfigError),

    #[error("application body failed")]
    Application(#[source] AppError),

    #[error("application body panicked: {0}")]
    Panicked(String),
}

/// What the application body receives once the host is running.
pub struct AppContext {
    pub logger: Logger,
    pub config: ResolvedConfig,
    pub settings: Settings,
    /// Fires when the host is asked to stop.
    pub shutdown: broadcast::Receiver<()>,
}

/// Inputs to configuration assembly and the console sink.
pub struct BootstrapOptions {
    sources: Vec<Box<dyn ConfigSource>>,
    secret_store: Option<Arc<dyn SecretStore>>,
    console: ConsoleTarget,
}

impl BootstrapOptions {
    pub fn new(console: ConsoleTarget) -> Self {
        Self {
            sources: Vec::new(),
            secret_store: None,
            console,
        }
    }

    /// Local source layered above the built-in defaults. Later sources win.
    pub fn source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Use this store instead of one built from `vault.endpoint`.
    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secret_store = Some(store);
        self
    }

    pub fn console(&self) -> &ConsoleTarget {
        &self.console
    }
}

/// Assemble configuration and typed settings.
///
/// The local layers are merged first so the secret store's own address and
/// credentials can come from file or environment. When a store is available
/// it becomes the highest layer and also serves the log destination
/// reference.
pub async fn load_configuration(options: BootstrapOptions) -> Result<(ResolvedConfig, Settings), ConfigError> {
    let local = options
        .sources
        .into_iter()
        .fold(Assembler::new().source(DefaultsSource), Assembler::boxed_source)
        .assemble()
        .await?;

    let vault = VaultSettings::from_config(&local).map_err(ConfigError::Validation)?;
    let budget = vault.connect_timeout + vault.request_timeout;

    let store: Option<Arc<dyn SecretStore>> = match (options.secret_store, &vault.endpoint) {
        (Some(store), _) => Some(store),
        (None, Some(endpoint)) => {
            let store = HttpSecretStore::new(endpoint, vault.token.clone(), vault.connect_timeout, vault.request_timeout)
                .map_err(|source| ConfigError::SecretStore {
                    store: endpoint.clone(),
                    source,
                })?;
            tracing::info!(endpoint = %store.endpoint(), "secret store enabled");
            Some(Arc::new(store))
        }
        (None, None) => {
            tracing::debug!("no secret store endpoint; using local configuration only");
            None
        }
    };

    let mut assembler = Assembler::new()
        .source(MemorySource::new("local", local.to_layer()))
        .secret_ref(SecretRef::new(keys::LOG_DESTINATION_SECRET_NAME, keys::REMOTE_URI)?);
    for key in REQUIRED_KEYS {
        assembler = assembler.require(ConfigKey::new(key)?);
    }
    if let Some(store) = store {
        assembler = assembler
            .source(SecretStoreSource::new(store.clone(), budget))
            .secret_store(store, budget);
    }

    let config = assembler.assemble().await?;
    let settings = Settings::from_config(&config).map_err(ConfigError::Validation)?;
    Ok((config, settings))
}

/// Runs the host lifecycle around an application body.
pub struct Bootstrapper {
    options: BootstrapOptions,
    shutdown: Shutdown,
    phase: watch::Sender<Phase>,
}

impl Bootstrapper {
    pub fn new(options: BootstrapOptions) -> Self {
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            options,
            shutdown: Shutdown::new(),
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Follow phase transitions from another task.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Handle that asks the running application body to stop.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run `app` to completion and return the terminal phase.
    ///
    /// The active pipeline is flushed before this returns, whichever way the
    /// application ended.
    pub async fn run<F, Fut>(self, app: F) -> Phase
    where
        F: FnOnce(AppContext) -> Fut,
        Fut: std::future::Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let Bootstrapper { options, shutdown, phase } = self;
        let console = options.console.clone();

        let bootstrap = Arc::new(Pipeline::bootstrap(console.clone()));
        let mut guard = FlushGuard::new(bootstrap.clone());
        let bootstrap_logger = Logger::new(bootstrap);
        bootstrap_logger.information("Starting web host");

        let (config, settings) = match load_configuration(options).await {
            Ok(loaded) => loaded,
            Err(error) => {
                bootstrap_logger.fatal_with(&BootstrapError::Configuration(error), FATAL_MESSAGE);
                return finish(guard, &phase, Phase::Fatal).await;
            }
        };

        let sinks = SinkRegistry::new(console).build_from_settings(&settings.logging).await;
        let pipeline = Arc::new(
            Pipeline::builder()
                .sinks(sinks)
                .enrichers(process_enrichers(&settings.application_name))
                .flush_timeout(settings.logging.flush_timeout)
                .build(),
        );
        guard.replace(pipeline.clone()).await;
        let logger = Logger::new(pipeline);
        tracing::info!(sinks = ?logger.pipeline().sink_names(), "log pipeline installed");

        let context = AppContext {
            logger: logger.clone(),
            config,
            settings,
            shutdown: shutdown.subscribe(),
        };
        phase.send_replace(Phase::Running);

        let failure = match tokio::spawn(app(context)).await {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(BootstrapError::Application(error)),
            Err(join) if join.is_panic() => Some(BootstrapError::Panicked(panic_message(join.into_panic()))),
            Err(_) => Some(BootstrapError::Panicked("application task was cancelled".to_string())),
        };

        let outcome = match failure {
            None => {
                logger.information("Host stopped");
                Phase::Stopped
            }
            Some(error) => {
                logger.fatal_with(&error, FATAL_MESSAGE);
                Phase::Fatal
            }
        };
        finish(guard, &phase, outcome).await
    }
}

async fn finish(guard: FlushGuard, phase: &watch::Sender<Phase>, outcome: Phase) -> Phase {
    if let Some(report) = guard.release().await {
        let timed_out: Vec<&str> = report.timed_out().collect();
        if !timed_out.is_empty() {
            tracing::warn!(sinks = ?timed_out, "some sinks did not drain before exit");
        }
    }
    phase.send_replace(outcome);
    outcome
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvSource, FileSource};
    use crate::secrets::MemorySecretStore;

    fn options(console: &ConsoleTarget) -> BootstrapOptions {
        BootstrapOptions::new(console.clone()).source(EnvSource::from_vars("LOGVAULT_", Vec::<(String, String)>::new()))
    }

    #[tokio::test]
    async fn test_local_only_run_stops_cleanly() {
        let console = ConsoleTarget::buffer();
        let bootstrapper = Bootstrapper::new(options(&console));
        let phases = bootstrapper.watch_phase();

        let phase = bootstrapper
            .run(|ctx| async move {
                assert!(ctx.settings.logging.remote.uri.is_none());
                ctx.logger.information("Hello from the app");
                Ok(())
            })
            .await;

        assert_eq!(phase, Phase::Stopped);
        assert_eq!(*phases.borrow(), Phase::Stopped);
        let out = console.contents();
        assert!(out.contains("INF] Starting web host"));
        assert!(out.contains("INF] Hello from the app"));
    }

    #[tokio::test]
    async fn test_application_error_is_fatal() {
        let console = ConsoleTarget::buffer();
        let phase = Bootstrapper::new(options(&console))
            .run(|_ctx| async { Err::<(), AppError>("database unreachable".into()) })
            .await;

        assert_eq!(phase, Phase::Fatal);
        assert_eq!(phase.exit_code(), ExitCode::FAILURE);
        let out = console.contents();
        assert!(out.contains("FTL] Host terminated unexpectedly"));
        assert!(out.contains("database unreachable"));
    }

    #[tokio::test]
    async fn test_application_panic_is_fatal() {
        let console = ConsoleTarget::buffer();
        let phase = Bootstrapper::new(options(&console))
            .run(|_ctx| async { panic!("boom") })
            .await;

        assert_eq!(phase, Phase::Fatal);
        assert!(console.contents().contains("application body panicked: boom"));
    }

    #[tokio::test]
    async fn test_configuration_error_surfaces_on_bootstrap_console() {
        let console = ConsoleTarget::buffer();
        let options = BootstrapOptions::new(console.clone())
            .source(FileSource::required("/definitely/not/here/logvault.toml"));

        let mut ran = false;
        let phase = Bootstrapper::new(options)
            .run(|_ctx| {
                ran = true;
                async { Ok(()) }
            })
            .await;

        assert_eq!(phase, Phase::Fatal);
        assert!(!ran);
        let out = console.contents();
        assert!(out.contains("FTL] Host terminated unexpectedly"));
        assert!(out.contains("configuration could not be assembled"));
    }

    #[tokio::test]
    async fn test_secret_store_layer_and_destination_reference() {
        let store = Arc::new(MemorySecretStore::with_secrets([
            ("logging--console--format", "json"),
            ("ElasticUri", "http://127.0.0.1:9/"),
        ]));
        let options = BootstrapOptions::new(ConsoleTarget::buffer())
            .source(EnvSource::from_vars(
                "LOGVAULT_",
                [
                    ("LOGVAULT_LOGGING__CONSOLE__FORMAT", "text"),
                    ("LOGVAULT_VAULT__LOG_DESTINATION_SECRET_NAME", "ElasticUri"),
                ],
            ))
            .secret_store(store);

        let (config, settings) = load_configuration(options).await.unwrap();

        assert_eq!(config.get(keys::CONSOLE_FORMAT), Some("json"));
        assert_eq!(settings.logging.remote.uri.as_deref(), Some("http://127.0.0.1:9/"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Phase::Stopped.exit_code(), ExitCode::SUCCESS);
        assert_eq!(Phase::Fatal.exit_code(), ExitCode::FAILURE);
        assert!(!Phase::Running.is_terminal());
    }
}
