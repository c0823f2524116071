//! Scenario worlds: bootstrap state for the lifecycle suites and a running
//! dispatch harness for the protocol suites.

use std::cell::RefCell;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use tempfile::TempDir;

use lintbridge_config::{ConnectionPolicy, SocketEndpoint};

use crate::bootstrap::{BootstrapError, ConfigLoader, Service, bootstrap_with};
use crate::dispatch::{AnalysisServices, DispatchConnectionHandler};
use crate::engine::EngineGuard;
use crate::process::ShutdownCause;
use crate::rules::{IncompatibleRules, RuleFilter};
use crate::transport::{ListenerHandle, SocketListener};

use super::client::TestClient;
use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::engine::{EngineRecorder, RecordingEngine, RecordingEngineProvider};
use super::quality_server::{FakeConnector, FakeQualityServer};
use super::reporter::RecordingHealthReporter;

/// Scenario world shared across bootstrap steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub provider: RecordingEngineProvider,
    pub recorder: Arc<EngineRecorder>,
    service: Option<Service>,
    bootstrap_error: Option<BootstrapError>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        let (provider, recorder) = RecordingEngineProvider::new();
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            provider,
            recorder,
            service: None,
            bootstrap_error: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::new());
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.service.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(&*self.loader, &*self.reporter, &self.provider) {
            Ok(service) => self.service = Some(service),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Stops the bootstrapped service, if any.
    pub fn stop(&mut self) {
        if let Some(service) = self.service.take() {
            service.stop().expect("engine stops cleanly");
        }
    }

    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    #[must_use]
    pub fn service_started(&self) -> bool {
        self.service.is_some()
    }

    fn reset_results(&mut self) {
        self.service = None;
        self.bootstrap_error = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}

/// Dispatch handler served on an ephemeral loopback port, backed by a
/// recording engine and an in-memory quality server.
pub struct ServiceHarness {
    pub recorder: Arc<EngineRecorder>,
    pub server: Arc<FakeQualityServer>,
    pub connector: Arc<FakeConnector>,
    engine: Option<EngineGuard>,
    listener: Option<ListenerHandle>,
    address: SocketAddr,
    quit: Receiver<ShutdownCause>,
    workspace: TempDir,
}

impl ServiceHarness {
    /// Starts a harness that drops no rules.
    #[must_use]
    pub fn start(policy: ConnectionPolicy) -> Self {
        Self::with_filter(policy, Arc::new(IncompatibleRules::new(Vec::<String>::new())))
    }

    /// Starts a harness with a custom rule filter.
    #[must_use]
    pub fn with_filter(policy: ConnectionPolicy, filter: Arc<dyn RuleFilter>) -> Self {
        let (engine, recorder) = RecordingEngine::new();
        let (connector, server) = FakeConnector::new();
        let guard = EngineGuard::start(Box::new(engine)).expect("engine starts");
        let services = AnalysisServices::new(
            guard.handle(),
            connector.clone(),
            filter,
            Duration::from_secs(5),
        );
        let (notify, quit) = mpsc::channel();
        let handler =
            DispatchConnectionHandler::new(Arc::new(services), policy).with_shutdown(notify);

        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind listener");
        let handle = listener.start(Arc::new(handler)).expect("start listener");
        let address = handle.local_addr().expect("tcp listener has an address");

        Self {
            recorder,
            server,
            connector,
            engine: Some(guard),
            listener: Some(handle),
            address,
            quit,
            workspace: TempDir::new().expect("workspace tempdir"),
        }
    }

    /// Opens a new client session.
    #[must_use]
    pub fn connect(&self) -> TestClient {
        TestClient::connect(self.address)
    }

    /// Directory analyses run against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        self.workspace.path()
    }

    /// Writes a source file under the base directory.
    pub fn write_source(&self, relative: &str, contents: &str) {
        let path = self.workspace.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create source directory");
        }
        fs::write(path, contents).expect("write source file");
    }

    /// True when a `quit` reached the shutdown channel within `timeout`.
    #[must_use]
    pub fn quit_requested(&self, timeout: Duration) -> bool {
        matches!(self.quit.recv_timeout(timeout), Ok(ShutdownCause::Quit))
    }
}

impl Drop for ServiceHarness {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.shutdown();
            let _ = handle.join();
        }
        if let Some(engine) = self.engine.take() {
            let _ = engine.stop();
        }
    }
}
