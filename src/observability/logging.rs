//! Self-diagnostic logging.
//!
//! # Responsibilities
//! - Install the tracing subscriber that carries the pipeline's own
//!   diagnostics (delivery failures, template registration, dead letters)
//! - Filter configurable through `LOGVAULT_SELFLOG`
//!
//! # Design Decisions
//! - Writes to stderr so it never mixes with console sink output on stdout
//! - Installation is idempotent; later calls are no-ops

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the self-log filter directive.
pub const SELFLOG_ENV: &str = "LOGVAULT_SELFLOG";

const DEFAULT_DIRECTIVE: &str = "logvault=warn";

/// Install the global self-log subscriber. Returns `false` when one was
/// already installed.
pub fn init_selflog() -> bool {
    let filter = EnvFilter::try_from_env(SELFLOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_selflog();
        assert!(!init_selflog());
    }
}
