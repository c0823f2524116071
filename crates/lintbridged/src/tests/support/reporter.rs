//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use lintbridge_config::Config;

use crate::bootstrap::BootstrapError;
use crate::engine::EngineError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    EngineStarting,
    EngineReady,
    EngineFailed(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn engine_starting(&self) {
        self.record(HealthEvent::EngineStarting);
    }

    fn engine_ready(&self) {
        self.record(HealthEvent::EngineReady);
    }

    fn engine_failed(&self, error: &EngineError) {
        self.record(HealthEvent::EngineFailed(error.to_string()));
    }
}
