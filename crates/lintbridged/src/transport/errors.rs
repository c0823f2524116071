//! Error types for socket listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host name did not resolve.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The TCP host name resolved to nothing.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// Binding the TCP listener failed.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Resolved address.
        addr: SocketAddr,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// Unix endpoints are unavailable on this platform.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix {
        /// Configured endpoint.
        endpoint: String,
    },
    /// Binding the Unix listener failed.
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: String,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Another service already listens on the socket.
    #[cfg(unix)]
    #[error("existing unix socket {path} is already in use; is another lintbridged running?")]
    UnixInUse {
        /// Socket path.
        path: String,
    },
    /// The socket path exists but is not a socket.
    #[cfg(unix)]
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket {
        /// Socket path.
        path: String,
    },
    /// The socket path could not be inspected.
    #[cfg(unix)]
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        /// Socket path.
        path: String,
        /// Metadata error.
        #[source]
        source: io::Error,
    },
    /// Probing an existing socket failed unexpectedly.
    #[cfg(unix)]
    #[error("failed to connect to existing unix socket {path}: {source}")]
    UnixConnect {
        /// Socket path.
        path: String,
        /// Connect error.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be removed.
    #[cfg(unix)]
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: String,
        /// Removal error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
