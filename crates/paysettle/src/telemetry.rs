//! Process-wide logging setup.
//!
//! Library code logs through `tracing`; the worker pool and scheduler still
//! use `log` macros, which are bridged into the same subscriber.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LogFormat;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log level '{level}': {reason}")]
    InvalidLevel { level: String, reason: String },

    #[error("Logging is already initialized")]
    AlreadyInitialized,
}

fn filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    // RUST_LOG wins over the configured level
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| TelemetryError::InvalidLevel {
        level: level.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_logging(format: LogFormat, level: &str) -> Result<(), TelemetryError> {
    let output = match format {
        LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    let subscriber = Registry::default().with(filter(level)?).with(output);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| TelemetryError::AlreadyInitialized)?;
    tracing_log::LogTracer::init().map_err(|_| TelemetryError::AlreadyInitialized)?;

    Ok(())
}
