//! Structured logging setup
//!
//! Installs a global `tracing` subscriber built from
//! [`LoggingConfig`]. `RUST_LOG` wins over the configured filter when set.

use healthhook_domain::{HealthHookError, LoggingConfig, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// # Errors
/// Returns `HealthHookError::Config` if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| {
        HealthHookError::Config(format!("Failed to install tracing subscriber: {e}"))
    })
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            HealthHookError::Config(format!("Invalid log filter '{}': {e}", config.filter))
        }),
    }
}
