//! Duplex connection channel to the service.
//!
//! A [`Channel`] owns one socket for its whole life. Senders share a single
//! mutex that covers the write half, the pending-request table and the
//! correlation-id counter, so two messages never interleave on the wire. One
//! reader thread decodes responses without holding that lock and hands each
//! to the continuation registered under its correlation id.
//!
//! Teardown happens once, on whichever comes first: a decode failure, the
//! service closing the connection, a failed write, [`Channel::close`] or drop.
//! It shuts the socket down and fails every continuation still waiting. A
//! protocol error sent under correlation id 0 is the service refusing the
//! connection; its message becomes the teardown cause.

mod pending;

use std::io::BufReader;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, warn};

use lintbridge_protocol::{
    Category, DecodeError, EncodeError, ErrorPayload, Message, decode, encode,
};

use crate::transport::Connection;

use self::pending::PendingTable;

const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Callback resumed with the response to one request.
///
/// Continuations run on the reader thread and must not block it.
pub type Continuation = Box<dyn FnOnce(Result<Message, ChannelError>) + Send + 'static>;

/// Errors reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel was closed, by either side, before a response arrived.
    #[error("connection to lintbridged is closed")]
    Closed,
    /// The connection failed at the transport level.
    #[error("connection to lintbridged was lost: {reason}")]
    Lost {
        /// Description of the transport failure.
        reason: String,
    },
    /// The service refused the connection, for instance because another
    /// client holds the session.
    #[error("lintbridged refused the connection ({code}): {message}")]
    Refused {
        /// Wire error code, `unknown` when absent.
        code: String,
        /// Service message.
        message: String,
    },
    /// The request was too large to frame; nothing was sent.
    #[error("request payload of {length} bytes exceeds the frame limit")]
    Oversized {
        /// Payload length.
        length: usize,
    },
}

impl ChannelError {
    fn lost(reason: impl ToString) -> Self {
        Self::Lost {
            reason: reason.to_string(),
        }
    }

    /// Reads a connection-level rejection: a protocol error under the
    /// reserved correlation id 0.
    fn refusal(message: &Message) -> Option<Self> {
        if message.correlation_id() != 0 || !message.category().is_protocol_error() {
            return None;
        }
        let body = message
            .parse_payload::<ErrorPayload>()
            .unwrap_or_else(|_| ErrorPayload::new(message.payload_text()));
        Some(Self::Refused {
            code: body.code.unwrap_or_else(|| String::from("unknown")),
            message: body.message,
        })
    }
}

struct Writer {
    connection: Connection,
    pending: PendingTable,
}

struct Shared {
    /// `None` once the channel has been torn down.
    state: Mutex<Option<Writer>>,
    /// Set when the service rejected the connection; reported in place of
    /// `Closed` or `Lost` from then on.
    refusal: Mutex<Option<ChannelError>>,
    unsolicited: Box<dyn Fn(Message) + Send + Sync>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Writer>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// The refusal, if one arrived, otherwise `fallback`.
    fn cause_or(&self, fallback: ChannelError) -> ChannelError {
        self.refusal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or(fallback)
    }

    fn teardown(&self, cause: &ChannelError) {
        let Some(mut writer) = self.lock().take() else {
            return;
        };
        if let Err(error) = writer.connection.shutdown() {
            debug!(target: CHANNEL_TARGET, %error, "socket shutdown failed");
        }
        let waiting = writer.pending.drain();
        debug!(
            target: CHANNEL_TARGET,
            pending = waiting.len(),
            %cause,
            "channel torn down"
        );
        for continuation in waiting {
            continuation(Err(cause.clone()));
        }
    }

    fn route(&self, message: Message) {
        let id = message.correlation_id();
        let continuation = self
            .lock()
            .as_mut()
            .and_then(|writer| writer.pending.take(id));
        match continuation {
            Some(continuation) => continuation(Ok(message)),
            None => {
                if let Some(refusal) = ChannelError::refusal(&message) {
                    *self.refusal.lock().unwrap_or_else(PoisonError::into_inner) = Some(refusal);
                }
                (self.unsolicited)(message);
            }
        }
    }
}

/// One live connection to the service.
pub struct Channel {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    /// Starts a channel over `connection`, logging unsolicited messages.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Lost`] when the socket cannot be split or the
    /// reader thread cannot be spawned.
    pub fn open(connection: Connection) -> Result<Self, ChannelError> {
        Self::with_unsolicited(connection, log_unsolicited)
    }

    /// Starts a channel that passes messages matching no pending request to
    /// `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Lost`] when the socket cannot be split or the
    /// reader thread cannot be spawned.
    pub fn with_unsolicited<H>(connection: Connection, handler: H) -> Result<Self, ChannelError>
    where
        H: Fn(Message) + Send + Sync + 'static,
    {
        let read_half = connection.try_clone().map_err(ChannelError::lost)?;
        let shared = Arc::new(Shared {
            state: Mutex::new(Some(Writer {
                connection,
                pending: PendingTable::new(),
            })),
            refusal: Mutex::new(None),
            unsolicited: Box::new(handler),
        });
        let reader_shared = Arc::clone(&shared);
        let reader = thread::Builder::new()
            .name(String::from("lintbridge-reader"))
            .spawn(move || receive_loop(&reader_shared, read_half))
            .map_err(ChannelError::lost)?;
        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Sends one request and returns its correlation id without waiting.
    ///
    /// `on_response` runs on the reader thread when the matching response
    /// arrives, or with an error if the channel tears down first.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] after teardown, [`ChannelError::Oversized`]
    /// for unframeable payloads and [`ChannelError::Lost`] when the write
    /// fails. In each case `on_response` is dropped without being called.
    pub fn send<F>(
        &self,
        category: Category,
        payload: Vec<u8>,
        on_response: F,
    ) -> Result<i32, ChannelError>
    where
        F: FnOnce(Result<Message, ChannelError>) + Send + 'static,
    {
        let failure = {
            let mut state = self.shared.lock();
            let Some(writer) = state.as_mut() else {
                drop(state);
                return Err(self.shared.cause_or(ChannelError::Closed));
            };
            let id = writer.pending.register(Box::new(on_response));
            match encode(&mut writer.connection, &Message::new(category, id, payload)) {
                Ok(()) => return Ok(id),
                Err(error) => {
                    drop(writer.pending.take(id));
                    error
                }
            }
        };
        match failure {
            EncodeError::Oversized { length } => Err(ChannelError::Oversized { length }),
            EncodeError::Io(error) => {
                warn!(target: CHANNEL_TARGET, %error, "request write failed");
                let cause = self.shared.cause_or(ChannelError::lost(&error));
                self.shared.teardown(&cause);
                Err(cause)
            }
        }
    }

    /// True until the channel has been torn down.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Tears the channel down, failing pending requests with
    /// [`ChannelError::Closed`], and waits for the reader thread.
    pub fn close(&self) {
        self.shared.teardown(&ChannelError::Closed);
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(reader) = reader {
            // A continuation that drops the channel runs on the reader itself.
            if reader.thread().id() != thread::current().id() && reader.join().is_err() {
                warn!(target: CHANNEL_TARGET, "reader thread panicked");
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

fn receive_loop(shared: &Shared, connection: Connection) {
    let mut reader = BufReader::new(connection);
    loop {
        match decode(&mut reader) {
            Ok(message) => shared.route(message),
            Err(DecodeError::Closed) => {
                debug!(target: CHANNEL_TARGET, "service closed the connection");
                shared.teardown(&shared.cause_or(ChannelError::Closed));
                break;
            }
            Err(error) => {
                if shared.is_open() {
                    warn!(target: CHANNEL_TARGET, %error, "dropping connection");
                }
                shared.teardown(&shared.cause_or(ChannelError::lost(&error)));
                break;
            }
        }
    }
}

fn log_unsolicited(message: Message) {
    warn!(
        target: CHANNEL_TARGET,
        category = %message.category(),
        correlation_id = message.correlation_id(),
        payload = %message.payload_text(),
        "message matches no pending request"
    );
}
