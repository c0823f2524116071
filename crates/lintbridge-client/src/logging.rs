//! Diagnostic logging for the `lintbridge` binary.
//!
//! Events go to the process's stderr, never to the writers the caller hands
//! to [`crate::run`], so rendered output stays clean.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use lintbridge_config::{Config, LogFormat};

use crate::AppError;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Installs the stderr subscriber filtered by `log_filter`.
///
/// The filter is validated on every call; only the first successful call
/// installs anything. A subscriber installed elsewhere in the process wins.
pub(crate) fn install(config: &Config) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| AppError::LogFilter(error.to_string()))?;
    let format = config.log_format();
    LOGGING.get_or_init(|| {
        let _ = tracing::subscriber::set_global_default(subscriber(filter, format));
    });
    Ok(())
}

fn subscriber(filter: EnvFilter, format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .without_time();
    match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    }
}
