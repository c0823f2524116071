//! Connection handler that runs framed request sessions.

use std::io::BufReader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use lintbridge_config::ConnectionPolicy;
use lintbridge_protocol::{
    AnalyzeRequest, Category, DecodeError, ErrorPayload, InitializeRequest, Message, decode,
};

use crate::process::ShutdownCause;
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::analysis::AnalysisServices;
use super::errors::DispatchError;
use super::response::ResponseWriter;
use super::session::SessionState;

/// Code carried by the `unexpectedError` sent to refused connections.
pub(crate) const SESSION_ACTIVE_CODE: &str = "session-active";

/// Session currently allowed to talk to the service.
struct ActiveSession {
    id: u64,
    /// Second handle on the session socket, used to evict it.
    stream: ConnectionStream,
}

/// Connection handler that admits sessions under the connection policy and
/// answers their requests.
pub(crate) struct DispatchConnectionHandler {
    services: Arc<AnalysisServices>,
    policy: ConnectionPolicy,
    active: Mutex<Option<ActiveSession>>,
    next_session: AtomicU64,
    shutdown: Option<Sender<ShutdownCause>>,
}

enum Flow {
    Continue,
    Quit,
}

enum Admission {
    Admitted(u64),
    Refused,
    Failed,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(services: Arc<AnalysisServices>, policy: ConnectionPolicy) -> Self {
        Self {
            services,
            policy,
            active: Mutex::new(None),
            next_session: AtomicU64::new(1),
            shutdown: None,
        }
    }

    /// Routes `quit` requests to `shutdown`.
    pub(crate) fn with_shutdown(mut self, shutdown: Sender<ShutdownCause>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Admits `stream` as the active session, or refuses it.
    fn admit(&self, stream: &ConnectionStream) -> Admission {
        let eviction_handle = match stream.try_clone() {
            Ok(handle) => handle,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to clone session socket");
                return Admission::Failed;
            }
        };
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = active.as_ref() {
            match self.policy {
                ConnectionPolicy::Reject => return Admission::Refused,
                ConnectionPolicy::Replace => {
                    info!(
                        target: DISPATCH_TARGET,
                        evicted = current.id,
                        session = id,
                        "replacing active session"
                    );
                    if let Err(error) = current.stream.shutdown() {
                        warn!(
                            target: DISPATCH_TARGET,
                            %error,
                            "failed to shut down evicted session"
                        );
                    }
                }
            }
        }
        *active = Some(ActiveSession {
            id,
            stream: eviction_handle,
        });
        Admission::Admitted(id)
    }

    fn release(&self, id: u64) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|current| current.id == id) {
            *active = None;
        }
    }

    fn refuse(mut stream: ConnectionStream) {
        warn!(
            target: DISPATCH_TARGET,
            peer = %stream.peer(),
            "refusing connection; another client is connected"
        );
        let payload = ErrorPayload::with_code(
            SESSION_ACTIVE_CODE,
            "another client is already connected to this lintbridge service",
        );
        let mut writer = ResponseWriter::new(&mut stream);
        if let Err(error) = writer.write_error(Category::UnexpectedError, 0, &payload) {
            debug!(target: DISPATCH_TARGET, %error, "refused client went away");
        }
        if let Err(error) = stream.shutdown() {
            debug!(target: DISPATCH_TARGET, %error, "failed to close refused connection");
        }
    }

    fn run_session(&self, id: u64, stream: ConnectionStream) {
        let writer_stream = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, session = id, %error, "failed to split session socket");
                return;
            }
        };
        info!(target: DISPATCH_TARGET, session = id, peer = %stream.peer(), "session opened");
        let mut reader = BufReader::new(stream);
        let mut writer = ResponseWriter::new(writer_stream);
        let mut state = SessionState::default();

        loop {
            let request = match decode(&mut reader) {
                Ok(request) => request,
                Err(DecodeError::Closed) => {
                    debug!(target: DISPATCH_TARGET, session = id, "client disconnected");
                    break;
                }
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, session = id, %error, "dropping connection");
                    break;
                }
            };
            debug!(
                target: DISPATCH_TARGET,
                session = id,
                category = %request.category(),
                correlation_id = request.correlation_id(),
                "request received"
            );

            match self.answer(&mut state, &request, &mut writer) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => {
                    self.request_shutdown();
                    break;
                }
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, session = id, %error, "failed to write response");
                    break;
                }
            }
        }

        let stream = reader.into_inner();
        if let Err(error) = stream.shutdown() {
            debug!(target: DISPATCH_TARGET, session = id, %error, "session socket already closed");
        }
        info!(target: DISPATCH_TARGET, session = id, "session closed");
    }

    /// Runs the operation named by `request` and writes its one response.
    fn answer(
        &self,
        state: &mut SessionState,
        request: &Message,
        writer: &mut ResponseWriter<ConnectionStream>,
    ) -> Result<Flow, DispatchError> {
        let id = request.correlation_id();
        match self.respond(state, request, writer) {
            Ok(flow) => Ok(flow),
            Err(error @ (DispatchError::Write(_) | DispatchError::SerializeResponse(_))) => {
                Err(error)
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    category = %request.category(),
                    correlation_id = id,
                    %error,
                    "request rejected"
                );
                writer.write_dispatch_error(id, &error)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn respond(
        &self,
        state: &mut SessionState,
        request: &Message,
        writer: &mut ResponseWriter<ConnectionStream>,
    ) -> Result<Flow, DispatchError> {
        let id = request.correlation_id();
        let category = request.category();
        match category {
            Category::Ping => {
                let pong = Message::new(Category::Pong, id, request.payload().to_vec());
                writer.write_message(&pong)?;
            }
            Category::Quit => {
                writer.write_message(&Message::empty(Category::QuitAck, id))?;
                return Ok(Flow::Quit);
            }
            Category::Initialize => {
                let body: InitializeRequest = request
                    .parse_payload()
                    .map_err(|source| DispatchError::malformed(category, source))?;
                state.initialize(self.services.initialize(&body)?);
                writer.write_message(&Message::empty(Category::Initialized, id))?;
            }
            Category::Analyze => {
                let settings = state
                    .settings()
                    .ok_or(DispatchError::Uninitialized { category })?;
                let body: AnalyzeRequest = request
                    .parse_payload()
                    .map_err(|source| DispatchError::malformed(category, source))?;
                match self.services.analyze(settings, &body) {
                    Ok(result) => writer.write_json(Category::AnalyzeResult, id, &result)?,
                    Err(error) => {
                        warn!(target: DISPATCH_TARGET, correlation_id = id, %error, "analysis failed");
                        writer.write_error(Category::AnalyzeError, id, &error.payload())?;
                    }
                }
            }
            Category::RuleRetrieve => {
                let settings = state
                    .settings()
                    .ok_or(DispatchError::Uninitialized { category })?;
                match self.services.rules(settings) {
                    Ok(result) => writer.write_json(Category::RuleRetrieveResult, id, &result)?,
                    Err(error) => {
                        warn!(target: DISPATCH_TARGET, correlation_id = id, %error, "rule retrieval failed");
                        writer.write_error(Category::RuleRetrieveError, id, &error.payload())?;
                    }
                }
            }
            _ => return Err(DispatchError::UnexpectedCategory { category }),
        }
        Ok(Flow::Continue)
    }

    fn request_shutdown(&self) {
        info!(target: DISPATCH_TARGET, "quit requested by client");
        let Some(shutdown) = &self.shutdown else {
            return;
        };
        if shutdown.send(ShutdownCause::Quit).is_err() {
            debug!(target: DISPATCH_TARGET, "service already shutting down");
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        match self.admit(&stream) {
            Admission::Admitted(id) => {
                self.run_session(id, stream);
                self.release(id);
            }
            Admission::Refused => Self::refuse(stream),
            Admission::Failed => {}
        }
    }
}
