//! logvault host process.
//!
//! Bootstraps configuration and the log pipeline, then runs until SIGINT or
//! SIGTERM. Exit status is 0 after a clean stop and 1 after any fatal error.
//!
//! ```text
//! logvault [--config <path>] [--env-prefix <prefix>]
//!
//! LOGVAULT_SELFLOG=logvault=debug   self-diagnostics on stderr
//! LOGVAULT_VAULT__ENDPOINT=...      enables the secret store
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use logvault::config::{EnvSource, FileSource};
use logvault::lifecycle::{wait_for_shutdown_signal, AppContext, AppError, BootstrapOptions, Bootstrapper};
use logvault::observability::logging::init_selflog;
use logvault::sinks::ConsoleTarget;

const DEFAULT_CONFIG: &str = "logvault.toml";

#[derive(Parser)]
#[command(name = "logvault")]
#[command(about = "Configuration-resolving structured log host", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults to ./logvault.toml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prefix of environment variables read as configuration.
    #[arg(long, default_value = "LOGVAULT_")]
    env_prefix: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_selflog();

    let file = match cli.config {
        Some(path) => FileSource::required(path),
        None => FileSource::optional(DEFAULT_CONFIG),
    };
    let options = BootstrapOptions::new(ConsoleTarget::Stdout)
        .source(file)
        .source(EnvSource::new(cli.env_prefix));

    let bootstrapper = Bootstrapper::new(options);
    let shutdown = bootstrapper.shutdown_handle();
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(_) => shutdown.trigger(),
            Err(error) => tracing::error!(error = %error, "failed to install signal handlers"),
        }
    });

    bootstrapper.run(serve).await.exit_code()
}

/// Application body: runs until asked to stop.
async fn serve(mut ctx: AppContext) -> Result<(), AppError> {
    ctx.logger.write_with(
        logvault::LogLevel::Information,
        "{Application} running with {SinkCount} sink(s)",
        [
            ("Application", serde_json::Value::from(ctx.settings.application_name.clone())),
            ("SinkCount", serde_json::Value::from(ctx.logger.pipeline().sink_names().len())),
        ],
    );

    let _ = ctx.shutdown.recv().await;
    ctx.logger.information("Shutdown requested");
    Ok(())
}
