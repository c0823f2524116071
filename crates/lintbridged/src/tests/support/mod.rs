//! Test harness utilities shared by the service test suites.

mod client;
mod config_loader;
mod engine;
mod quality_server;
mod reporter;
mod world;

pub use client::{TestClient, analyze_request, initialize_request};
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use engine::{EngineRecorder, RecordingEngine, RecordingEngineProvider};
pub use quality_server::{FakeConnector, FakeQualityServer};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{ServiceHarness, TestWorld, world};
