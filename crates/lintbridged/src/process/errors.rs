//! Defines the unified error surface for service launch and supervision.

use std::sync::Arc;

use thiserror::Error;

use ortho_config::OrthoError;

use crate::bootstrap::BootstrapError;
use crate::engine::EngineError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the service process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Bootstrapping the service failed.
    #[error("service bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// Socket listener startup or shutdown failed.
    #[error("service socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// Every shutdown notifier went away without a cause.
    #[error("shutdown notification channel closed unexpectedly")]
    ShutdownChannel,
    /// Stopping the analysis engine failed.
    #[error("failed to stop analysis engine: {source}")]
    EngineStop {
        /// Engine stop error.
        #[source]
        source: EngineError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<EngineError> for LaunchError {
    fn from(source: EngineError) -> Self {
        Self::EngineStop { source }
    }
}
