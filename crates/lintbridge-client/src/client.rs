//! Request/response exchanges layered on a [`Channel`].
//!
//! Every exchange comes in two forms. The `*_with` form sends the request and
//! returns at once; its callback runs on the channel's reader thread when the
//! response arrives. The plain form blocks the calling thread on a one-shot
//! channel until the callback fires, which is what the command-line front end
//! wants.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use serde::Serialize;
use thiserror::Error;

use lintbridge_config::SocketEndpoint;
use lintbridge_protocol::{
    AnalyzeErrorCode, AnalyzeRequest, AnalyzeResult, Category, ErrorPayload, InitializeRequest,
    Message, RuleInfo, RuleRetrieveResult,
};

use crate::channel::{Channel, ChannelError};
use crate::transport::{self, TransportError};

/// Errors surfaced to client callers.
///
/// `Display` is the one message shown to the user for the failure.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The connection failed or closed before the response arrived.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The request body could not be serialised.
    #[error("failed to serialise {category} request: {source}")]
    EncodeRequest {
        /// Request category.
        category: Category,
        /// Serialiser error.
        #[source]
        source: serde_json::Error,
    },
    /// The response body did not match its category.
    #[error("malformed {category} response: {source}")]
    DecodeResponse {
        /// Response category.
        category: Category,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The service reported a failed analysis.
    #[error("analysis failed ({code}): {message}")]
    Analysis {
        /// Wire error code, `unknown` when absent.
        code: String,
        /// Service message.
        message: String,
    },
    /// The service could not list rules.
    #[error("rule retrieval failed ({code}): {message}")]
    RuleRetrieval {
        /// Wire error code, `unknown` when absent.
        code: String,
        /// Service message.
        message: String,
    },
    /// The session has not been initialised.
    #[error("lintbridged is not initialised: {message}")]
    Uninitialized {
        /// Service message.
        message: String,
    },
    /// The service rejected the request at the protocol level.
    #[error("lintbridged rejected the request ({category}): {message}")]
    Rejected {
        /// `invalidRequest` or `unexpectedError`.
        category: Category,
        /// Wire error code, if any.
        code: Option<String>,
        /// Service message.
        message: String,
    },
    /// The response category does not answer the request.
    #[error("expected {expected} from lintbridged but received {actual}")]
    UnexpectedResponse {
        /// Category the exchange waits for.
        expected: Category,
        /// Category that arrived.
        actual: Category,
    },
}

impl ClientError {
    /// Parsed analyze error code, when the failure is an `analyzeError`.
    #[must_use]
    pub fn analyze_code(&self) -> Option<AnalyzeErrorCode> {
        match self {
            Self::Analysis { code, .. } => AnalyzeErrorCode::from_wire(code),
            _ => None,
        }
    }

    /// True when the service does not appear to be running.
    #[must_use]
    pub fn is_service_not_running(&self) -> bool {
        matches!(self, Self::Transport(error) if error.is_service_not_running())
    }
}

/// Callback receiving the outcome of one exchange.
pub type Reply<T> = Box<dyn FnOnce(Result<T, ClientError>) + Send + 'static>;

/// Client session with the analysis service.
pub struct Client {
    channel: Channel,
}

impl Client {
    /// Connects to the service at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the service cannot be reached.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, ClientError> {
        let connection = transport::connect(endpoint)?;
        Ok(Self::new(Channel::open(connection)?))
    }

    /// Wraps an open channel.
    #[must_use]
    pub const fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Sends `ping`; the callback receives the echoed payload.
    ///
    /// # Errors
    ///
    /// Returns the send failure; the callback is not invoked in that case.
    pub fn ping_with<F>(&self, payload: Vec<u8>, on_reply: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Vec<u8>, ClientError>) + Send + 'static,
    {
        self.exchange(Category::Ping, payload, move |message| {
            on_reply(expect_category(message, Category::Pong).map(Message::into_payload));
        })
    }

    /// Sends `initialize`.
    ///
    /// # Errors
    ///
    /// Returns the send failure; the callback is not invoked in that case.
    pub fn initialize_with<F>(
        &self,
        request: &InitializeRequest,
        on_reply: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(Result<(), ClientError>) + Send + 'static,
    {
        let payload = to_json(Category::Initialize, request)?;
        self.exchange(Category::Initialize, payload, move |message| {
            on_reply(expect_category(message, Category::Initialized).map(drop));
        })
    }

    /// Sends `analyze` for `input_files` under `base_dir`.
    ///
    /// Absolute inputs under `base_dir` are sent relative to it.
    ///
    /// # Errors
    ///
    /// Returns the send failure; the callback is not invoked in that case.
    pub fn analyze_with<F>(
        &self,
        base_dir: &Path,
        input_files: &[PathBuf],
        on_reply: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(Result<AnalyzeResult, ClientError>) + Send + 'static,
    {
        let request = AnalyzeRequest {
            base_dir: base_dir.to_path_buf(),
            input_files: relative_inputs(base_dir, input_files),
        };
        let payload = to_json(Category::Analyze, &request)?;
        self.exchange(Category::Analyze, payload, move |message| {
            on_reply(
                expect_category(message, Category::AnalyzeResult).and_then(|reply| parse(&reply)),
            );
        })
    }

    /// Sends `ruleRetrieve`.
    ///
    /// # Errors
    ///
    /// Returns the send failure; the callback is not invoked in that case.
    pub fn retrieve_rules_with<F>(&self, on_reply: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Vec<RuleInfo>, ClientError>) + Send + 'static,
    {
        self.exchange(Category::RuleRetrieve, Vec::new(), move |message| {
            let rules = expect_category(message, Category::RuleRetrieveResult)
                .and_then(|reply| parse::<RuleRetrieveResult>(&reply))
                .map(|result| result.rules);
            on_reply(rules);
        })
    }

    /// Sends `quit`.
    ///
    /// # Errors
    ///
    /// Returns the send failure; the callback is not invoked in that case.
    pub fn quit_with<F>(&self, on_reply: F) -> Result<(), ClientError>
    where
        F: FnOnce(Result<(), ClientError>) + Send + 'static,
    {
        self.exchange(Category::Quit, Vec::new(), move |message| {
            on_reply(expect_category(message, Category::QuitAck).map(drop));
        })
    }

    /// Blocking [`Self::ping_with`].
    ///
    /// # Errors
    ///
    /// Returns any transport, protocol or service failure.
    pub fn ping(&self, payload: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        wait(|reply| self.ping_with(payload, reply))
    }

    /// Blocking [`Self::initialize_with`].
    ///
    /// # Errors
    ///
    /// Returns any transport, protocol or service failure.
    pub fn initialize(&self, request: &InitializeRequest) -> Result<(), ClientError> {
        wait(|reply| self.initialize_with(request, reply))
    }

    /// Blocking [`Self::analyze_with`].
    ///
    /// # Errors
    ///
    /// Returns any transport, protocol or service failure, including
    /// [`ClientError::Analysis`] for a failed run.
    pub fn analyze(
        &self,
        base_dir: &Path,
        input_files: &[PathBuf],
    ) -> Result<AnalyzeResult, ClientError> {
        wait(|reply| self.analyze_with(base_dir, input_files, reply))
    }

    /// Blocking [`Self::retrieve_rules_with`].
    ///
    /// # Errors
    ///
    /// Returns any transport, protocol or service failure.
    pub fn retrieve_rules(&self) -> Result<Vec<RuleInfo>, ClientError> {
        wait(|reply| self.retrieve_rules_with(reply))
    }

    /// Blocking [`Self::quit_with`].
    ///
    /// # Errors
    ///
    /// Returns any transport, protocol or service failure.
    pub fn quit(&self) -> Result<(), ClientError> {
        wait(|reply| self.quit_with(reply))
    }

    /// Closes the connection, failing anything still pending.
    pub fn close(&self) {
        self.channel.close();
    }

    fn exchange<F>(
        &self,
        category: Category,
        payload: Vec<u8>,
        on_message: F,
    ) -> Result<(), ClientError>
    where
        F: FnOnce(Result<Message, ClientError>) + Send + 'static,
    {
        self.channel
            .send(category, payload, move |outcome| {
                on_message(outcome.map_err(ClientError::from));
            })
            .map(drop)
            .map_err(ClientError::from)
    }
}

/// Makes absolute inputs under `base_dir` relative; everything else is kept.
#[must_use]
pub fn relative_inputs(base_dir: &Path, input_files: &[PathBuf]) -> Vec<PathBuf> {
    input_files
        .iter()
        .map(|input| {
            if input.is_absolute() {
                input
                    .strip_prefix(base_dir)
                    .map_or_else(|_| input.clone(), Path::to_path_buf)
            } else {
                input.clone()
            }
        })
        .collect()
}

fn wait<T, S>(send: S) -> Result<T, ClientError>
where
    T: Send + 'static,
    S: FnOnce(Reply<T>) -> Result<(), ClientError>,
{
    let (tx, rx) = mpsc::sync_channel(1);
    send(Box::new(move |outcome| {
        let _ = tx.send(outcome);
    }))?;
    // The channel fails every pending reply on teardown, so a dropped sender
    // only happens if the reader thread died.
    rx.recv().unwrap_or(Err(ClientError::Channel(ChannelError::Closed)))
}

fn to_json<T: Serialize>(category: Category, body: &T) -> Result<Vec<u8>, ClientError> {
    serde_json::to_vec(body).map_err(|source| ClientError::EncodeRequest { category, source })
}

fn parse<T: serde::de::DeserializeOwned>(message: &Message) -> Result<T, ClientError> {
    message
        .parse_payload()
        .map_err(|source| ClientError::DecodeResponse {
            category: message.category(),
            source,
        })
}

/// Accepts `message` when it is `expected`; maps failure categories to errors.
fn expect_category(
    message: Result<Message, ClientError>,
    expected: Category,
) -> Result<Message, ClientError> {
    let message = message?;
    let actual = message.category();
    if actual == expected {
        return Ok(message);
    }
    let error = error_body(&message);
    Err(match actual {
        Category::AnalyzeError => ClientError::Analysis {
            code: error.code.unwrap_or_else(|| String::from("unknown")),
            message: error.message,
        },
        Category::RuleRetrieveError => ClientError::RuleRetrieval {
            code: error.code.unwrap_or_else(|| String::from("unknown")),
            message: error.message,
        },
        Category::Uninitialized => ClientError::Uninitialized {
            message: error.message,
        },
        Category::InvalidRequest | Category::UnexpectedError => ClientError::Rejected {
            category: actual,
            code: error.code,
            message: error.message,
        },
        _ => ClientError::UnexpectedResponse { expected, actual },
    })
}

/// Error body of a failure response, falling back to its raw text.
fn error_body(message: &Message) -> ErrorPayload {
    message
        .parse_payload()
        .unwrap_or_else(|_| ErrorPayload::new(message.payload_text()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[cfg(unix)]
    #[rstest]
    #[case("/work/src/a.pas", "src/a.pas")]
    #[case("/elsewhere/b.pas", "/elsewhere/b.pas")]
    #[case("c.pas", "c.pas")]
    #[case("../d.pas", "../d.pas")]
    fn inputs_under_the_base_become_relative(#[case] input: &str, #[case] expected: &str) {
        let inputs = relative_inputs(Path::new("/work"), &[PathBuf::from(input)]);

        assert_eq!(inputs, vec![PathBuf::from(expected)]);
    }

    #[rstest]
    fn analyze_errors_keep_code_and_message() {
        let body = ErrorPayload::analyze(AnalyzeErrorCode::RemoteServer, "server down");
        let message = Message::json(Category::AnalyzeError, 4, &body).expect("body");

        let error = expect_category(Ok(message), Category::AnalyzeResult).expect_err("failure");

        assert_eq!(error.analyze_code(), Some(AnalyzeErrorCode::RemoteServer));
        assert_eq!(error.to_string(), "analysis failed (remote-server): server down");
    }

    #[rstest]
    fn non_json_error_bodies_are_shown_verbatim() {
        let message = Message::new(Category::UnexpectedError, 0, b"boom".to_vec());

        let error = expect_category(Ok(message), Category::Pong).expect_err("failure");

        assert!(matches!(&error, ClientError::Rejected { code: None, .. }));
        assert!(error.to_string().ends_with("boom"), "{error}");
    }

    #[rstest]
    fn unrelated_categories_are_unexpected() {
        let message = Message::empty(Category::Initialized, 1);

        let error = expect_category(Ok(message), Category::QuitAck).expect_err("failure");

        assert!(matches!(
            error,
            ClientError::UnexpectedResponse {
                expected: Category::QuitAck,
                actual: Category::Initialized,
            }
        ));
    }
}
