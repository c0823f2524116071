//! Analysis service paired with editor-integrated lintbridge clients.
//!
//! The service listens on the endpoint configured through
//! [`lintbridge_config`], accepts one client session at a time and answers
//! framed requests from [`lintbridge_protocol`]. Each session starts
//! uninitialised; an `initialize` request records the toolchain settings and,
//! optionally, a remote quality server. `analyze` requests then run the
//! wrapped [`AnalysisEngine`] and, when a quality server is configured, drop
//! findings that were already resolved upstream (see [`tracking`]).
//!
//! The engine holds per-run state, so every analysis goes through a single
//! mutex owned by the [`EngineGuard`]. Requests from one session are handled
//! strictly in order, which means a second `analyze` only starts once the
//! first response has been written.

mod bootstrap;
mod dispatch;
pub mod engine;
mod health;
mod process;
mod rules;
pub mod server;
mod telemetry;
pub mod tracking;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, ConfiguredEngineProvider, EngineProvider, Service,
    StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use dispatch::{AnalysisError, DispatchError, RuleRetrieveError};
pub use engine::{
    AnalysisEngine, EngineError, EngineGuard, EngineHandle, EngineOutput, EngineRequest,
    ProcessEngine, UnconfiguredEngine,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_service,
};
pub use rules::{IncompatibleRules, RuleFilter};
pub use server::{
    ActiveRule, QualityServer, QualityServerError, ResolvedFinding, ServerConnector,
    ServerSettings, SonarQubeConnector, SonarQubeServer,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
