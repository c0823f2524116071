//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("invalid log filter: {0}")]
    LogFilter(String),
    #[error("failed to resolve the working directory: {0}")]
    WorkingDirectory(io::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(serde_json::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(#[from] io::Error),
}

impl AppError {
    pub(crate) fn is_service_not_running(&self) -> bool {
        matches!(self, Self::Client(error) if error.is_service_not_running())
    }
}
