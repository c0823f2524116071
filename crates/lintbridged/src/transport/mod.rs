//! Socket listener for service endpoints.
//!
//! The transport module binds the configured endpoint and accepts
//! connections on a background thread, handing each one to a
//! [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::CountingHandler;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
