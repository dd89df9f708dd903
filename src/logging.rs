//! Tracing subscriber setup for binaries.
//!
//! The library itself only emits `tracing` events; embedding applications
//! install their own subscriber. The `keyward` CLI calls [`init_logging`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` when set, otherwise `keyward=<level>`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(format!("keyward={}", config.level.to_lowercase())),
    }
}

/// Install the global subscriber. Does nothing when logging is disabled, and
/// is a no-op if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) {
    if !config.enabled {
        return;
    }

    let filter = env_filter(config);
    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
