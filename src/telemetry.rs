use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{AgentError, Result};

/// Installs the global subscriber. `RUST_LOG` wins over the configured filter.
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.filter).map_err(|err| {
            AgentError::Config(format!("invalid log filter `{}`: {err}", cfg.filter))
        })?,
    };

    let installed = if cfg.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    };
    Ok(installed.is_ok())
}
