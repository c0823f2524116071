//! Error types for request dispatch failures.
//!
//! [`DispatchError`] covers protocol-level failures that are answered with
//! one of the generic error categories. [`AnalysisError`] and
//! [`RuleRetrieveError`] are operation failures answered with the
//! operation's own error category.

use thiserror::Error;

use lintbridge_protocol::{AnalyzeErrorCode, Category, EncodeError, ErrorPayload};

use crate::engine::EngineError;
use crate::server::QualityServerError;

/// Protocol-level failures correlated to a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload did not parse as the body the category requires.
    #[error("malformed {category} payload: {source}")]
    MalformedPayload {
        /// Request category.
        category: Category,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// The category is not a request the service answers.
    #[error("{category} is not a request category")]
    UnexpectedCategory {
        /// Offending category.
        category: Category,
    },
    /// The request needs a prior successful `initialize`.
    #[error("{category} requires a successful initialize on this connection")]
    Uninitialized {
        /// Offending category.
        category: Category,
    },
    /// The initialize request named unusable quality-server settings.
    #[error("invalid quality server settings: {0}")]
    InvalidSettings(#[source] QualityServerError),
    /// Building the quality-server client failed.
    #[error("failed to prepare quality server client: {0}")]
    ServerClient(#[source] QualityServerError),
    /// Response serialisation failed.
    #[error("failed to serialise response: {0}")]
    SerializeResponse(#[from] serde_json::Error),
    /// Writing the response failed.
    #[error("failed to write response: {0}")]
    Write(#[from] EncodeError),
}

impl DispatchError {
    /// Creates a malformed payload error.
    pub(crate) const fn malformed(category: Category, source: serde_json::Error) -> Self {
        Self::MalformedPayload { category, source }
    }

    /// Category of the error response sent back to the client.
    #[must_use]
    pub const fn response_category(&self) -> Category {
        match self {
            Self::MalformedPayload { .. }
            | Self::UnexpectedCategory { .. }
            | Self::InvalidSettings(_) => Category::InvalidRequest,
            Self::Uninitialized { .. } => Category::Uninitialized,
            Self::ServerClient(_) | Self::SerializeResponse(_) | Self::Write(_) => {
                Category::UnexpectedError
            }
        }
    }

    /// Machine-readable code carried in the error payload.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "malformed-payload",
            Self::UnexpectedCategory { .. } => "unexpected-category",
            Self::Uninitialized { .. } => "uninitialized",
            Self::InvalidSettings(_) => "invalid-settings",
            Self::ServerClient(_) => "remote-server",
            Self::SerializeResponse(_) | Self::Write(_) => "internal",
        }
    }

    /// Error payload describing this failure.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload::with_code(self.code(), self.to_string())
    }
}

/// Failures of an `analyze` operation.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The request named unusable inputs.
    #[error("{message}")]
    InvalidInput {
        /// What was wrong with the inputs.
        message: String,
    },
    /// The engine failed.
    #[error("analysis failed: {0}")]
    Engine(#[from] EngineError),
    /// The quality server could not be queried.
    #[error("{0}")]
    RemoteServer(#[from] QualityServerError),
}

impl AnalysisError {
    /// Creates an invalid input error.
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wire error code for this failure.
    #[must_use]
    pub const fn code(&self) -> AnalyzeErrorCode {
        match self {
            Self::InvalidInput { .. } => AnalyzeErrorCode::InvalidInput,
            Self::Engine(_) => AnalyzeErrorCode::Engine,
            Self::RemoteServer(_) => AnalyzeErrorCode::RemoteServer,
        }
    }

    /// `analyzeError` payload describing this failure.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload::analyze(self.code(), self.to_string())
    }
}

/// Failures of a `ruleRetrieve` operation.
#[derive(Debug, Error)]
pub enum RuleRetrieveError {
    /// The session was initialised without a quality server.
    #[error("no quality server is configured for this session")]
    NoServer,
    /// The quality server could not be queried.
    #[error("{0}")]
    RemoteServer(#[from] QualityServerError),
}

impl RuleRetrieveError {
    /// `ruleRetrieveError` payload describing this failure.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        let code = match self {
            Self::NoServer => "no-server",
            Self::RemoteServer(_) => AnalyzeErrorCode::RemoteServer.as_str(),
        };
        ErrorPayload::with_code(code, self.to_string())
    }
}
