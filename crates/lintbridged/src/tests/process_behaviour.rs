//! Behavioural tests covering the service run loop and its shutdown paths.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use lintbridge_protocol::{Category, Message};

use crate::health::HealthReporter;
use crate::process::launch::{LaunchPlan, ServiceDeps, run_service_with};
use crate::process::{LaunchError, ShutdownError, ShutdownSignal};
use crate::server::ServerConnector;
use crate::tests::support::{
    EngineRecorder, FailingConfigLoader, FakeConnector, RecordingEngineProvider,
    RecordingHealthReporter, TestClient, TestConfigLoader,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

type StepResult = Result<(), String>;

/// Shutdown signal released by the test instead of the operating system.
#[derive(Clone, Default)]
struct TestShutdownSignal {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    fn trigger(&self) {
        let (flag, ready) = &*self.state;
        *flag.lock().expect("shutdown flag lock") = true;
        ready.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (flag, ready) = &*self.state;
        let mut triggered = flag.lock().expect("shutdown flag lock");
        while !*triggered {
            triggered = ready.wait(triggered).expect("shutdown condvar");
        }
        Ok(())
    }
}

struct ProcessWorld {
    reporter: Arc<RecordingHealthReporter>,
    provider: RecordingEngineProvider,
    recorder: Arc<EngineRecorder>,
    shutdown: TestShutdownSignal,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    address: Option<SocketAddr>,
    result: Option<Result<(), LaunchError>>,
}

impl ProcessWorld {
    fn new() -> Self {
        let (provider, recorder) = RecordingEngineProvider::new();
        Self {
            reporter: Arc::new(RecordingHealthReporter::default()),
            provider,
            recorder,
            shutdown: TestShutdownSignal::default(),
            handle: None,
            address: None,
            result: None,
        }
    }

    fn deps<L>(&self, loader: L) -> ServiceDeps<L, RecordingEngineProvider> {
        let (connector, _server) = FakeConnector::new();
        ServiceDeps {
            loader,
            reporter: self.reporter.clone() as Arc<dyn HealthReporter>,
            engines: self.provider.clone(),
            connector: connector as Arc<dyn ServerConnector>,
        }
    }

    fn start(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err(String::from("service already running"));
        }
        let plan = LaunchPlan {
            shutdown: self.shutdown.clone(),
            services: self.deps(TestConfigLoader::new()),
        };
        let (ready, bound) = mpsc::channel();
        self.handle = Some(thread::spawn(move || run_service_with(plan, Some(ready))));
        let address = bound
            .recv_timeout(WAIT_TIMEOUT)
            .map_err(|error| format!("service never became ready: {error}"))?;
        self.address = Some(address.ok_or("tcp listener reported no address")?);
        Ok(())
    }

    fn run_with_invalid_config(&mut self) {
        let plan = LaunchPlan {
            shutdown: self.shutdown.clone(),
            services: self.deps(FailingConfigLoader),
        };
        self.result = Some(run_service_with(plan, None));
    }

    fn connect(&self) -> Result<TestClient, String> {
        let address = self.address.ok_or("service is not running")?;
        Ok(TestClient::connect(address))
    }

    fn join(&mut self) -> StepResult {
        let handle = self.handle.take().ok_or("service not running")?;
        let result = handle
            .join()
            .map_err(|_| String::from("service thread panicked"))?;
        self.result = Some(result);
        Ok(())
    }
}

impl Drop for ProcessWorld {
    fn drop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<ProcessWorld> {
    RefCell::new(ProcessWorld::new())
}

#[given("a running service")]
fn given_running_service(world: &RefCell<ProcessWorld>) -> StepResult {
    world.borrow_mut().start()
}

#[when("the service runs with an invalid configuration")]
fn when_invalid_configuration(world: &RefCell<ProcessWorld>) {
    world.borrow_mut().run_with_invalid_config();
}

#[when("a termination signal arrives")]
fn when_signal_arrives(world: &RefCell<ProcessWorld>) {
    world.borrow().shutdown.trigger();
}

#[when("a client sends quit")]
fn when_client_quits(world: &RefCell<ProcessWorld>) -> StepResult {
    let mut client = world.borrow().connect()?;
    let reply = client.request(&Message::empty(Category::Quit, 1));
    if reply.category() == Category::QuitAck {
        Ok(())
    } else {
        Err(format!("expected quitAck, got {}", reply.category()))
    }
}

#[when("the service run completes")]
fn when_run_completes(world: &RefCell<ProcessWorld>) -> StepResult {
    world.borrow_mut().join()
}

#[then("a client can ping the service")]
fn then_client_pings(world: &RefCell<ProcessWorld>) -> StepResult {
    let mut client = world.borrow().connect()?;
    let reply = client.request(&Message::empty(Category::Ping, 5));
    if reply.category() == Category::Pong {
        Ok(())
    } else {
        Err(format!("expected pong, got {}", reply.category()))
    }
}

#[then("the service exited cleanly")]
fn then_exited_cleanly(world: &RefCell<ProcessWorld>) {
    let world = world.borrow();
    let result = world.result.as_ref().expect("run result recorded");
    assert!(result.is_ok(), "service run failed: {result:?}");
}

#[then("the service exited with a bootstrap error")]
fn then_bootstrap_error(world: &RefCell<ProcessWorld>) {
    let world = world.borrow();
    let result = world.result.as_ref().expect("run result recorded");
    assert!(
        matches!(result, Err(LaunchError::Bootstrap { .. })),
        "expected a bootstrap error, got {result:?}"
    );
}

#[then("the analysis engine was stopped")]
fn then_engine_stopped(world: &RefCell<ProcessWorld>) {
    assert_eq!(world.borrow().recorder.stops(), 1);
}

#[then("the analysis engine was never started")]
fn then_engine_never_started(world: &RefCell<ProcessWorld>) {
    assert_eq!(world.borrow().recorder.starts(), 0);
}

#[scenario(path = "tests/features/service_process.feature")]
fn service_process(world: RefCell<ProcessWorld>) -> Result<(), String> {
    let _ = world;
    Ok(())
}
