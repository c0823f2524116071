//! Structured health reporting for service lifecycle events.

use std::sync::Arc;

use lintbridge_config::Config;

use crate::bootstrap::BootstrapError;
use crate::engine::EngineError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the analysis engine is started.
    fn engine_starting(&self);

    /// Invoked after the analysis engine starts.
    fn engine_ready(&self);

    /// Invoked when the analysis engine fails to start.
    fn engine_failed(&self, error: &EngineError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn engine_starting(&self) {
        (**self).engine_starting();
    }

    fn engine_ready(&self) {
        (**self).engine_ready();
    }

    fn engine_failed(&self, error: &EngineError) {
        (**self).engine_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting service bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.service_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            connection_policy = %config.connection_policy(),
            "service bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "service bootstrap failed"
        );
    }

    fn engine_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "engine_starting",
            "starting analysis engine"
        );
    }

    fn engine_ready(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "engine_ready",
            "analysis engine ready"
        );
    }

    fn engine_failed(&self, error: &EngineError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "engine_failed",
            error = %error,
            "analysis engine failed to start"
        );
    }
}
