//! Supervises service launch sequencing and runtime orchestration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::{info, warn};

use crate::StructuredHealthReporter;
use crate::bootstrap::{
    ConfigLoader, ConfiguredEngineProvider, EngineProvider, SystemConfigLoader, bootstrap_with,
};
use crate::dispatch::{AnalysisServices, DispatchConnectionHandler};
use crate::health::HealthReporter;
use crate::rules::IncompatibleRules;
use crate::server::{ServerConnector, SonarQubeConnector};
use crate::transport::SocketListener;

use super::errors::LaunchError;
use super::shutdown::{ShutdownCause, ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Service dependencies required to construct the runtime.
pub(crate) struct ServiceDeps<L, P> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) engines: P,
    pub(crate) connector: Arc<dyn ServerConnector>,
}

/// Collaborators required to launch the service runtime.
pub(crate) struct LaunchPlan<L, P, S> {
    pub(crate) shutdown: S,
    pub(crate) services: ServiceDeps<L, P>,
}

/// Runs the service in the foreground using the production collaborators.
///
/// Returns once a termination signal or a client `quit` has been handled.
///
/// # Errors
///
/// Returns a [`LaunchError`] when the service cannot start or shut down
/// cleanly.
pub fn run_service() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        shutdown: SystemShutdownSignal::new(SHUTDOWN_TIMEOUT),
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
            engines: ConfiguredEngineProvider,
            connector: Arc::new(SonarQubeConnector),
        },
    };
    run_service_with(plan, None)
}

/// Runs the service with injected collaborators.
///
/// `ready` receives the bound TCP address, if any, once the listener is
/// accepting connections.
pub(crate) fn run_service_with<L, P, S>(
    plan: LaunchPlan<L, P, S>,
    ready: Option<Sender<Option<SocketAddr>>>,
) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    P: EngineProvider,
    S: ShutdownSignal + 'static,
{
    let LaunchPlan { shutdown, services } = plan;
    let ServiceDeps {
        loader,
        reporter,
        engines,
        connector,
    } = services;

    let service = bootstrap_with(&loader, &*reporter, &engines)?;
    let config = service.config().clone();
    info!(
        target: PROCESS_TARGET,
        socket = %config.service_socket(),
        "starting service runtime"
    );
    let listener = SocketListener::bind(config.service_socket())?;

    let (notify, causes) = mpsc::channel();
    let analysis = AnalysisServices::new(
        service.engine(),
        connector,
        Arc::new(IncompatibleRules::new(config.incompatible_rules())),
        config.request_timeout(),
    );
    let handler = DispatchConnectionHandler::new(Arc::new(analysis), config.connection_policy())
        .with_shutdown(notify.clone());
    let listener_handle = listener.start(Arc::new(handler))?;
    if let Some(ready) = ready {
        let _ = ready.send(listener_handle.local_addr());
    }

    thread::spawn(move || {
        let cause = match shutdown.wait() {
            Ok(()) => ShutdownCause::Signal,
            Err(error) => ShutdownCause::SignalFailed(error),
        };
        let _ = notify.send(cause);
    });

    let outcome = match causes.recv() {
        Ok(ShutdownCause::Signal) => Ok(()),
        Ok(ShutdownCause::Quit) => {
            info!(target: PROCESS_TARGET, "quit request received");
            Ok(())
        }
        Ok(ShutdownCause::SignalFailed(error)) => Err(LaunchError::from(error)),
        Err(_) => Err(LaunchError::ShutdownChannel),
    };

    listener_handle.shutdown();
    let joined = listener_handle.join();
    let stopped = service.stop();
    outcome?;
    joined?;
    if let Err(error) = stopped {
        warn!(target: PROCESS_TARGET, %error, "analysis engine did not stop cleanly");
        return Err(error.into());
    }
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
