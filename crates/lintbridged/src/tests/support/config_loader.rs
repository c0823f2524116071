//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use lintbridge_config::{Config, LogFormat, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that binds the service to an ephemeral loopback port.
#[derive(Debug, Clone)]
pub struct TestConfigLoader {
    config: Config,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config {
                service_socket: SocketEndpoint::tcp("127.0.0.1", 0),
                log_format: LogFormat::Compact,
                ..Config::default()
            },
        }
    }

    /// Mutable access to the configuration handed out by the loader.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("lintbridged"),
            OsString::from("--service-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
