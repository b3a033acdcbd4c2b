//! `tracing_subscriber` initialisation for the process's global logger.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Initialises the global subscriber once. `log_level` seeds the default
/// directive; `LOGLEVEL` (or `RUST_LOG`, which `EnvFilter` honours natively)
/// overrides it per the environment.
pub fn init(log_level: &str) {
    let default_directive = log_level.parse().unwrap_or(tracing::Level::INFO.into());
    let filter = EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(filter)
        .init();
}
