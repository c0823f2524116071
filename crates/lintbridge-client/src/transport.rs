//! Socket transport for the lintbridge client.
//!
//! [`connect`] opens the configured service endpoint and wraps the stream in a
//! [`Connection`] so the channel can read, write and shut it down without
//! caring which socket family is underneath.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};
use thiserror::Error;

use lintbridge_config::SocketEndpoint;

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while opening a connection to the service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The TCP host did not resolve.
    #[error("failed to resolve service address {endpoint}: {source}")]
    Resolve {
        /// Configured endpoint.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Nothing accepted the connection.
    #[error("failed to connect to lintbridged at {endpoint}: {source}")]
    Connect {
        /// Configured endpoint.
        endpoint: String,
        /// Socket error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are unavailable on this platform.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
}

impl TransportError {
    /// True when the error suggests the service is simply not running.
    #[must_use]
    pub fn is_service_not_running(&self) -> bool {
        match self {
            Self::Connect { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::NotFound
                    | io::ErrorKind::AddrNotAvailable
            ),
            _ => false,
        }
    }
}

/// Established stream to the service.
#[derive(Debug)]
pub enum Connection {
    /// Loopback or remote TCP stream.
    Tcp(TcpStream),
    /// Unix domain socket stream.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /// Second handle on the same socket.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the descriptor cannot be duplicated.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Shuts both directions down, waking any blocked reader.
    ///
    /// # Errors
    ///
    /// Returns the OS error, except when the peer already disconnected.
    pub fn shutdown(&self) -> io::Result<()> {
        let result = match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Err(error) if error.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Connects to `endpoint`.
///
/// # Errors
///
/// Returns a [`TransportError`] when the address does not resolve or nothing
/// accepts the connection within [`CONNECTION_TIMEOUT`].
pub fn connect(endpoint: &SocketEndpoint) -> Result<Connection, TransportError> {
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let endpoint_display = endpoint.to_string();
            let address =
                resolve_tcp_address(host, *port).map_err(|source| TransportError::Resolve {
                    endpoint: endpoint_display.clone(),
                    source,
                })?;
            let stream = TcpStream::connect_timeout(&address, CONNECTION_TIMEOUT).map_err(
                |source| TransportError::Connect {
                    endpoint: endpoint_display,
                    source,
                },
            )?;
            // Requests are small and latency-bound.
            let _ = stream.set_nodelay(true);
            Ok(Connection::Tcp(stream))
        }
        SocketEndpoint::Unix { path } => {
            #[cfg(unix)]
            {
                connect_unix(path.as_str()).map_err(|source| TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })
            }

            #[cfg(not(unix))]
            {
                let _ = path;
                Err(TransportError::UnsupportedUnixTransport(endpoint.to_string()))
            }
        }
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

#[cfg(unix)]
fn connect_unix(path: &str) -> io::Result<Connection> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, CONNECTION_TIMEOUT)?;
    let stream: UnixStream = socket.into();
    Ok(Connection::Unix(stream))
}
