//! Wrapped static-analysis engine.
//!
//! The service is the only caller of the engine. An [`EngineGuard`] starts the
//! engine once, hands out [`EngineHandle`]s that serialise every analysis
//! through one mutex, and stops the engine exactly once, either explicitly or
//! when the guard is dropped.

mod process;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use lintbridge_protocol::Finding;

use crate::server::ActiveRule;

pub use self::process::ProcessEngine;

pub(crate) const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Engine property carrying the toolchain installation path.
pub const TOOLCHAIN_PATH_PROPERTY: &str = "toolchainPath";

/// Engine property carrying the compiler version.
pub const COMPILER_VERSION_PROPERTY: &str = "compilerVersion";

/// Input for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
    /// Directory the input files are relative to.
    pub base_dir: PathBuf,
    /// `/`-separated paths relative to `base_dir`.
    pub input_files: Vec<String>,
    /// Rules enabled for this run, already filtered for compatibility.
    pub active_rules: Vec<ActiveRule>,
    /// Engine settings captured from `initialize`.
    pub properties: BTreeMap<String, String>,
}

/// Result of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// Findings in the order the engine reported them.
    pub findings: Vec<Finding>,
    /// Log lines emitted while the engine ran.
    pub log_messages: Vec<String>,
}

/// Lifecycle and analysis operations of the wrapped engine.
///
/// Implementations keep mutable per-run state and are never called
/// concurrently; [`EngineHandle`] enforces that.
pub trait AnalysisEngine: Send {
    /// Prepares the engine. Called once before any analysis.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the engine cannot be brought up.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Analyses the files named by `request`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] on I/O or configuration failures.
    fn analyze(&mut self, request: &EngineRequest) -> Result<EngineOutput, EngineError>;

    /// Releases engine resources. Called once.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when shutdown fails.
    fn stop(&mut self) -> Result<(), EngineError>;
}

/// Errors raised by the wrapped engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No analyzer command is configured.
    #[error("no analysis engine is configured; set engine_command")]
    NotConfigured,
    /// Analysis was requested before `start` or after `stop`.
    #[error("analysis engine is not running")]
    NotStarted,
    /// The analyzer process could not be spawned.
    #[error("failed to launch analyzer '{command}': {source}")]
    Spawn {
        /// Analyzer executable.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Talking to the analyzer process failed.
    #[error("failed to communicate with analyzer '{command}': {source}")]
    Io {
        /// Analyzer executable.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The analyzer exited unsuccessfully.
    #[error("analyzer '{command}' exited with {status}")]
    Exit {
        /// Analyzer executable.
        command: String,
        /// Exit status description.
        status: String,
    },
    /// The analyzer exited without writing a response line.
    #[error("analyzer '{command}' produced no output")]
    MissingOutput {
        /// Analyzer executable.
        command: String,
    },
    /// The analyzer response line was not valid JSON.
    #[error("analyzer '{command}' produced malformed output: {source}")]
    MalformedOutput {
        /// Analyzer executable.
        command: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// Serialising the analysis request failed.
    #[error("failed to serialise analysis request: {0}")]
    SerializeRequest(#[source] serde_json::Error),
    /// A previous analysis panicked while holding the engine.
    #[error("analysis engine lock poisoned")]
    Poisoned,
}

type SharedEngine = Arc<Mutex<Box<dyn AnalysisEngine>>>;

/// Owns the running engine and stops it exactly once.
pub struct EngineGuard {
    engine: SharedEngine,
    stopped: bool,
}

impl EngineGuard {
    /// Starts `engine` and takes ownership of it.
    ///
    /// # Errors
    ///
    /// Returns the engine's start error. A partially started engine is
    /// stopped before the error is returned.
    pub fn start(mut engine: Box<dyn AnalysisEngine>) -> Result<Self, EngineError> {
        if let Err(error) = engine.start() {
            if let Err(stop_error) = engine.stop() {
                warn!(
                    target: ENGINE_TARGET,
                    error = %stop_error,
                    "failed to stop analysis engine after a failed start"
                );
            }
            return Err(error);
        }
        info!(target: ENGINE_TARGET, "analysis engine started");
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            stopped: false,
        })
    }

    /// Returns a handle that serialises analyses against this engine.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            engine: Arc::clone(&self.engine),
        }
    }

    /// Stops the engine.
    ///
    /// Waits for an in-flight analysis to finish first.
    ///
    /// # Errors
    ///
    /// Returns the engine's stop error, or [`EngineError::Poisoned`].
    pub fn stop(mut self) -> Result<(), EngineError> {
        self.stopped = true;
        stop_engine(&self.engine)
    }
}

impl fmt::Debug for EngineGuard {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EngineGuard")
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(error) = stop_engine(&self.engine) {
            warn!(
                target: ENGINE_TARGET,
                %error,
                "failed to stop analysis engine"
            );
        }
    }
}

fn stop_engine(engine: &SharedEngine) -> Result<(), EngineError> {
    let mut engine = engine.lock().map_err(|_| EngineError::Poisoned)?;
    engine.stop()?;
    info!(target: ENGINE_TARGET, "analysis engine stopped");
    Ok(())
}

/// Shared access to the running engine.
///
/// Every call to [`EngineHandle::analyze`] holds the engine mutex for the
/// whole run, so analyses from any session queue behind each other.
#[derive(Clone)]
pub struct EngineHandle {
    engine: SharedEngine,
}

impl EngineHandle {
    /// Runs one analysis, waiting for any analysis already in progress.
    ///
    /// # Errors
    ///
    /// Returns the engine error, or [`EngineError::Poisoned`] when an earlier
    /// analysis panicked.
    pub fn analyze(&self, request: &EngineRequest) -> Result<EngineOutput, EngineError> {
        let mut engine = self.engine.lock().map_err(|_| EngineError::Poisoned)?;
        engine.analyze(request)
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

/// Engine used when no analyzer command is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredEngine;

impl AnalysisEngine for UnconfiguredEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        warn!(
            target: ENGINE_TARGET,
            "no analyzer command configured; every analysis will fail"
        );
        Ok(())
    }

    fn analyze(&mut self, _request: &EngineRequest) -> Result<EngineOutput, EngineError> {
        Err(EngineError::NotConfigured)
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}
