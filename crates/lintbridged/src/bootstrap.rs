//! Service bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use lintbridge_config::{Config, SocketPreparationError};

use crate::engine::{
    AnalysisEngine, EngineError, EngineGuard, EngineHandle, ProcessEngine, UnconfiguredEngine,
};
use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the service configuration.
    ///
    /// # Errors
    ///
    /// Returns the layered loader error.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out an already resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Builds the analysis engine for a resolved configuration.
pub trait EngineProvider {
    /// Returns an unstarted engine.
    fn provide(&self, config: &Config) -> Box<dyn AnalysisEngine>;
}

/// Provider running the configured analyzer command, if any.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredEngineProvider;

impl EngineProvider for ConfiguredEngineProvider {
    fn provide(&self, config: &Config) -> Box<dyn AnalysisEngine> {
        match config.engine_command() {
            Some(command) => Box::new(ProcessEngine::new(command, config.engine_args().to_vec())),
            None => Box::new(UnconfiguredEngine),
        }
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare service socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The analysis engine failed to start.
    #[error("failed to start analysis engine: {source}")]
    Engine {
        /// Engine start error.
        #[source]
        source: EngineError,
    },
}

/// Result of a successful bootstrap invocation.
///
/// Owns the running engine; dropping the service stops it.
#[derive(Debug)]
pub struct Service {
    config: Config,
    engine: EngineGuard,
    telemetry: TelemetryHandle,
}

impl Service {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Handle used by sessions to run analyses.
    #[must_use]
    pub fn engine(&self) -> EngineHandle {
        self.engine.handle()
    }

    /// Stops the engine.
    ///
    /// # Errors
    ///
    /// Returns the engine's stop error.
    pub fn stop(self) -> Result<(), EngineError> {
        self.engine.stop()
    }
}

/// Bootstraps the service using the supplied collaborators.
///
/// The engine is started last, so every earlier failure leaves nothing to
/// clean up.
///
/// # Errors
///
/// Returns a [`BootstrapError`] naming the failed stage; the reporter sees
/// the same error first.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    engines: &dyn EngineProvider,
) -> Result<Service, BootstrapError> {
    reporter.bootstrap_starting();
    let result = bootstrap_stages(loader, reporter, engines);
    match &result {
        Ok(service) => reporter.bootstrap_succeeded(service.config()),
        Err(error) => reporter.bootstrap_failed(error),
    }
    result
}

fn bootstrap_stages(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
    engines: &dyn EngineProvider,
) -> Result<Service, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .service_socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    reporter.engine_starting();
    let engine = match EngineGuard::start(engines.provide(&config)) {
        Ok(engine) => engine,
        Err(source) => {
            reporter.engine_failed(&source);
            return Err(BootstrapError::Engine { source });
        }
    };
    reporter.engine_ready();

    Ok(Service {
        config,
        engine,
        telemetry,
    })
}
