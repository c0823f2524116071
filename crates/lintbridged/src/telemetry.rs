//! Structured log subscriber installation for the service.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use lintbridge_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned once the global subscriber is in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring the log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Installing the global subscriber failed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global `tracing` subscriber on first use.
///
/// Later calls return a fresh handle without touching the global state, so
/// tests that bootstrap the service several times in one process keep working.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable `log_filter` and
/// [`TelemetryError::Subscriber`] when another subscriber is already global.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|()| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(io::stderr)
            // Editors capture stderr into log panes; keep colour codes out of them.
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
