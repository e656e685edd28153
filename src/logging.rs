//! Structured logging for the `parameter` binary.
//!
//! Logs go to stderr so they never mix with the key listing on stdout.

use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

fn filter_from_config(config: &CliConfig) -> EnvFilter {
    EnvFilter::new(config.log_level.to_string())
}

/// Install a global fmt subscriber at the configured level.
///
/// If a global subscriber is already set the call is a no-op; the first
/// subscriber wins.
pub fn init_logging(config: &CliConfig) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_from_config(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
