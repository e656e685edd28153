//! Command-line configuration.
//!
//! The log level comes from `PARAMETER_LOG_LEVEL` and can be overridden by
//! `--log-level`. Levels are tracing's own [`LevelFilter`], so `off` is
//! accepted alongside `error` through `trace`.

use std::env;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

/// Environment variable holding the default log level.
pub const LOG_LEVEL_VAR: &str = "PARAMETER_LOG_LEVEL";

/// Errors in the command-line configuration itself.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Parse a log level name. Surrounding whitespace is ignored.
pub fn parse_log_level(text: &str) -> Result<LevelFilter, CliError> {
    text.trim().parse().map_err(|_| {
        CliError::InvalidConfig(format!(
            "'{text}' is not a log level; use off, error, warn, info, debug or trace"
        ))
    })
}

/// Configuration for the `parameter` binary.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Redefinition warnings are logged at `warn`, which is the default.
    pub log_level: LevelFilter,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            log_level: LevelFilter::WARN,
        }
    }
}

impl CliConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, CliError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value. An empty variable counts as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CliConfig::default();
        if let Some(value) = lookup(LOG_LEVEL_VAR).filter(|v| !v.trim().is_empty()) {
            config.log_level = parse_log_level(&value)?;
        }
        Ok(config)
    }

    /// Let a `--log-level` flag win over the environment.
    #[must_use]
    pub fn apply_overrides(mut self, log_level: Option<LevelFilter>) -> Self {
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }
}
