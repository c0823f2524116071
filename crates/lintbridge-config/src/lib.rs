//! Shared configuration for the lintbridge analysis service and its clients.
//!
//! Both binaries load the same [`Config`] through `ortho_config`, which layers
//! built-in defaults, an optional TOML file (`--config-path` or
//! `LINTBRIDGE_CONFIG_PATH`), `LINTBRIDGE_*` environment variables and command
//! line flags, in increasing order of precedence. The service reads the
//! listener, logging, engine and rule-filter settings; the client reads the
//! endpoint plus the values it forwards in its `initialize` request.

mod defaults;
mod logging;
mod policy;
mod socket;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TCP_PORT,
    default_connection_policy, default_log_filter, default_log_filter_string, default_log_format,
    default_request_timeout_secs, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::ConnectionPolicy;
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by `lintbridged` and `lintbridge`.
///
/// Fields with an `ortho_config` default seed the defaults layer, so a bare
/// invocation with no file, environment or flags still resolves.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "LINTBRIDGE")]
pub struct Config {
    /// Endpoint the service listens on and the client connects to.
    #[ortho_config(default = default_socket_endpoint())]
    #[serde(default = "default_socket_endpoint")]
    pub service_socket: SocketEndpoint,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format for the service.
    #[ortho_config(default = default_log_format())]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Behaviour when a second client connects.
    #[ortho_config(default = default_connection_policy())]
    #[serde(default = "default_connection_policy")]
    pub connection_policy: ConnectionPolicy,
    /// Analyzer executable wrapped by the service.
    #[serde(default)]
    pub engine_command: Option<String>,
    /// Extra arguments passed to the analyzer executable.
    #[serde(default)]
    pub engine_args: Vec<String>,
    /// Rule keys that must never reach the engine.
    #[serde(default)]
    pub incompatible_rules: Vec<String>,
    /// Timeout for quality-server HTTP requests, in seconds.
    #[ortho_config(default = default_request_timeout_secs())]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Toolchain installation path forwarded on initialize.
    #[serde(default)]
    pub toolchain_path: Option<String>,
    /// Compiler version forwarded on initialize.
    #[serde(default)]
    pub compiler_version: Option<String>,
    /// Quality-server base URL forwarded on initialize.
    #[serde(default)]
    pub server_url: Option<String>,
    /// Quality-server project key forwarded on initialize.
    #[serde(default)]
    pub project_key: Option<String>,
    /// Quality-server API token forwarded on initialize.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Quality-server language key used to pick the quality profile.
    #[serde(default)]
    pub language_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            connection_policy: default_connection_policy(),
            engine_command: None,
            engine_args: Vec::new(),
            incompatible_rules: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
            toolchain_path: None,
            compiler_version: None,
            server_url: None,
            project_key: None,
            api_token: None,
            language_key: None,
        }
    }
}

impl Config {
    /// Endpoint shared by the service and the client.
    #[must_use]
    pub fn service_socket(&self) -> &SocketEndpoint {
        &self.service_socket
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Policy for overlapping connections.
    #[must_use]
    pub const fn connection_policy(&self) -> ConnectionPolicy {
        self.connection_policy
    }

    /// Analyzer executable, when one is configured.
    #[must_use]
    pub fn engine_command(&self) -> Option<&str> {
        non_blank(self.engine_command.as_deref())
    }

    /// Extra analyzer arguments.
    #[must_use]
    pub fn engine_args(&self) -> &[String] {
        &self.engine_args
    }

    /// Rule keys excluded from engine configuration.
    #[must_use]
    pub fn incompatible_rules(&self) -> &[String] {
        &self.incompatible_rules
    }

    /// Quality-server request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Quality-server URL, treating blank values as unset.
    #[must_use]
    pub fn server_url(&self) -> Option<&str> {
        non_blank(self.server_url.as_deref())
    }

    /// Quality-server project key, treating blank values as unset.
    #[must_use]
    pub fn project_key(&self) -> Option<&str> {
        non_blank(self.project_key.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}
