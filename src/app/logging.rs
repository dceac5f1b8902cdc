use super::config::{LogFormat, LogLevel};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum InitializationError {
    #[error("Logging initialization failed: {details}")]
    LoggingInitFailed {
        details: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Dependency targets that are far too chatty below `warn`.
const QUIET_TARGETS: &[&str] = &["hyper", "reqwest", "h2", "warp"];

/// Filter used when `RUST_LOG` is not set.
pub fn build_filter_string(level: LogLevel) -> String {
    let mut parts = Vec::with_capacity(QUIET_TARGETS.len() + 1);
    parts.push(level.as_str().to_string());
    parts.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    parts.join(",")
}

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn setup_logging(level: LogLevel, format: LogFormat) -> Result<(), InitializationError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let filter_string = build_filter_string(level);
            EnvFilter::try_new(&filter_string).map_err(|e| {
                InitializationError::LoggingInitFailed {
                    details: format!("Failed to create EnvFilter with '{filter_string}'"),
                    source: Box::new(e),
                }
            })?
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_level(true).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };

    result.map_err(|e| InitializationError::LoggingInitFailed {
        details: "Failed to set global tracing subscriber".to_string(),
        source: Box::new(e),
    })
}
