use crate::logging::LogFormat;
use crate::policy::ConnectionPolicy;
use crate::socket::SocketEndpoint;

/// Loopback address the service binds by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// TCP port the service listens on when nothing else is configured.
pub const DEFAULT_TCP_PORT: u16 = 14000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default timeout applied to quality-server HTTP requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the service.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default policy for overlapping client connections.
#[must_use]
pub fn default_connection_policy() -> ConnectionPolicy {
    ConnectionPolicy::Reject
}

/// Default quality-server request timeout in seconds.
#[must_use]
pub const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Computes the default service endpoint.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_HOST, DEFAULT_TCP_PORT)
}
