//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file output.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the event filter: `RUST_LOG` wins over the configured level.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?)
}

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid, the log file cannot
/// be opened, or a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use locale_mgmt::config::LoggingConfig;
/// use locale_mgmt::logging::init_tracing;
///
/// init_tracing(&LoggingConfig::default()).unwrap();
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(config)?);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    if config.json_format {
        let stdout_layer = fmt::layer().json().with_current_span(true);
        let file_layer = file.map(|file| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(file)
        });
        registry.with(stdout_layer).with(file_layer).try_init()?;
    } else {
        let stdout_layer = fmt::layer().with_target(true).with_level(true);
        let file_layer = file.map(|file| {
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
        });
        registry.with(stdout_layer).with(file_layer).try_init()?;
    }

    Ok(())
}
