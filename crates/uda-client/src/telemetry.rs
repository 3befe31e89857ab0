//! Logging set-up for the `uda` binary.
//!
//! Same subscriber shape as the server, but quiet unless asked: the filter
//! defaults to `warn` and the format to compact.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, fmt};
use uda_config::{Config, LogFormat};

/// Filter applied when the configuration names none.
pub const CLIENT_LOG_FILTER: &str = "warn";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Failures installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber is already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the global subscriber once per process.
///
/// # Errors
///
/// Fails when the filter does not parse or a subscriber is already set.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| ())
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let expression = config.log_filter.as_deref().unwrap_or(CLIENT_LOG_FILTER);
    let filter =
        EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter(error.to_string()))?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let subscriber: Box<dyn Subscriber + Send + Sync> =
        match config.log_format.unwrap_or(LogFormat::Compact) {
            LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
            LogFormat::Compact => Box::new(builder.compact().finish()),
            LogFormat::Pretty => Box::new(builder.pretty().finish()),
        };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_filters() {
        let config = Config {
            log_filter: Some(String::from("uda_client=loudest")),
            ..Config::default()
        };
        let error = install_subscriber(&config).expect_err("filter should fail to parse");
        assert!(matches!(error, TelemetryError::Filter(_)));
    }
}
