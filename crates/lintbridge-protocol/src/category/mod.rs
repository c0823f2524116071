//! One-byte message categories.

use std::fmt;

/// Category code carried in the first byte of every frame.
///
/// Codes outside the known set still decode as [`Category::Unrecognized`] so
/// the receiving dispatcher can answer them with a protocol error instead of
/// tearing the connection down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Liveness recorder.
    Ping,
    /// Liveness reply echoing the ping payload.
    Pong,
    /// Request asking the service to shut down.
    Quit,
    /// Acknowledgement sent before the service shuts down.
    QuitAck,
    /// Engine and remote-server configuration request.
    Initialize,
    /// Successful initialize response.
    Initialized,
    /// Rejection of a request that needs a prior initialize.
    Uninitialized,
    /// Analysis request for a file set under a base directory.
    Analyze,
    /// Successful analysis response carrying findings.
    AnalyzeResult,
    /// Failed analysis response carrying a structured error.
    AnalyzeError,
    /// Rule metadata request.
    RuleRetrieve,
    /// Rule metadata response.
    RuleRetrieveResult,
    /// Rule metadata failure.
    RuleRetrieveError,
    /// Protocol-level failure correlated to the offending request.
    InvalidRequest,
    /// Protocol-level failure not attributable to a request payload.
    UnexpectedError,
    /// Code outside the known set.
    Unrecognized(u8),
}

impl Category {
    /// Returns the wire code for this category.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Ping => 1,
            Self::Pong => 5,
            Self::Quit => 15,
            Self::QuitAck => 16,
            Self::Initialize => 20,
            Self::Initialized => 25,
            Self::Uninitialized => 26,
            Self::Analyze => 30,
            Self::AnalyzeResult => 35,
            Self::AnalyzeError => 36,
            Self::RuleRetrieve => 40,
            Self::RuleRetrieveResult => 45,
            Self::RuleRetrieveError => 46,
            Self::InvalidRequest => 241,
            Self::UnexpectedError => 242,
            Self::Unrecognized(code) => code,
        }
    }

    /// Maps a wire code to its category.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Ping,
            5 => Self::Pong,
            15 => Self::Quit,
            16 => Self::QuitAck,
            20 => Self::Initialize,
            25 => Self::Initialized,
            26 => Self::Uninitialized,
            30 => Self::Analyze,
            35 => Self::AnalyzeResult,
            36 => Self::AnalyzeError,
            40 => Self::RuleRetrieve,
            45 => Self::RuleRetrieveResult,
            46 => Self::RuleRetrieveError,
            241 => Self::InvalidRequest,
            242 => Self::UnexpectedError,
            other => Self::Unrecognized(other),
        }
    }

    /// Returns `true` for the protocol-level failure categories.
    #[must_use]
    pub const fn is_protocol_error(self) -> bool {
        matches!(
            self,
            Self::InvalidRequest | Self::UnexpectedError | Self::Uninitialized
        )
    }

    /// Stable lower camel-case name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Quit => "quit",
            Self::QuitAck => "quitAck",
            Self::Initialize => "initialize",
            Self::Initialized => "initialized",
            Self::Uninitialized => "uninitialized",
            Self::Analyze => "analyze",
            Self::AnalyzeResult => "analyzeResult",
            Self::AnalyzeError => "analyzeError",
            Self::RuleRetrieve => "ruleRetrieve",
            Self::RuleRetrieveResult => "ruleRetrieveResult",
            Self::RuleRetrieveError => "ruleRetrieveError",
            Self::InvalidRequest => "invalidRequest",
            Self::UnexpectedError => "unexpectedError",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

impl From<u8> for Category {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<Category> for u8 {
    fn from(category: Category) -> Self {
        category.code()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized(code) => write!(f, "unrecognized({code})"),
            known => f.write_str(known.name()),
        }
    }
}
