//! Typed JSON bodies carried in message payloads.
//!
//! Field names are camelCase on the wire. Optional initialize settings are
//! omitted when unset so older peers see the same shape they always did.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Body of an `initialize` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Toolchain installation the engine analyses against.
    pub toolchain_path: String,
    /// Compiler version of the analysed project.
    pub compiler_version: String,
    /// Remote quality-server base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    /// Project key on the remote quality server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_key: Option<String>,
    /// API token for the remote quality server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Language key used to select the quality profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_key: Option<String>,
}

/// Body of an `analyze` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Directory every input path is resolved against.
    pub base_dir: PathBuf,
    /// Files to analyse, relative to `base_dir` where possible.
    pub input_files: Vec<PathBuf>,
}

/// Body of an `analyzeResult` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// Findings that survived reconciliation, in engine order.
    pub issues: Vec<Finding>,
    /// Log lines emitted by the engine during the run.
    #[serde(default)]
    pub log_messages: Vec<String>,
}

/// Half-open source range; lines are 1-based, offsets 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    /// First line of the range.
    pub start_line: u32,
    /// Offset into the first line.
    pub start_offset: u32,
    /// Last line of the range.
    pub end_line: u32,
    /// Offset into the last line.
    pub end_offset: u32,
}

impl TextRange {
    /// Builds a range from its four coordinates.
    #[must_use]
    pub const fn new(start_line: u32, start_offset: u32, end_line: u32, end_offset: u32) -> Self {
        Self {
            start_line,
            start_offset,
            end_line,
            end_offset,
        }
    }
}

/// One rule violation reported by an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Fully qualified rule key, e.g. `community-delphi:TooLongLine`.
    pub rule_key: String,
    /// Human-readable message.
    pub message: String,
    /// Path relative to the analysis base directory, `/`-separated.
    pub file: String,
    /// Location of the violation.
    pub range: TextRange,
}

impl Finding {
    /// Builds a finding.
    #[must_use]
    pub fn new(
        rule_key: impl Into<String>,
        message: impl Into<String>,
        file: impl Into<String>,
        range: TextRange,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            message: message.into(),
            file: file.into(),
            range,
        }
    }

    /// First line of the finding.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.range.start_line
    }
}

/// Error body shared by every failure category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Machine-readable error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ErrorPayload {
    /// Builds an error body without a code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Builds an error body carrying a code.
    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Builds an `analyzeError` body.
    #[must_use]
    pub fn analyze(code: AnalyzeErrorCode, message: impl Into<String>) -> Self {
        Self::with_code(code.as_str(), message)
    }
}

/// Codes carried by `analyzeError` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyzeErrorCode {
    /// The wrapped engine failed.
    Engine,
    /// The remote quality server could not be queried.
    RemoteServer,
    /// The request named unusable inputs.
    InvalidInput,
}

impl AnalyzeErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::RemoteServer => "remote-server",
            Self::InvalidInput => "invalid-input",
        }
    }

    /// Parses a wire code.
    #[must_use]
    pub fn from_wire(code: &str) -> Option<Self> {
        match code {
            "engine" => Some(Self::Engine),
            "remote-server" => Some(Self::RemoteServer),
            "invalid-input" => Some(Self::InvalidInput),
            _ => None,
        }
    }
}

/// Rule metadata returned by `ruleRetrieve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInfo {
    /// Fully qualified rule key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Rule type, e.g. `CODE_SMELL`.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Default severity, e.g. `MAJOR`.
    pub severity: String,
}

/// Body of a `ruleRetrieveResult` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRetrieveResult {
    /// Rule metadata keyed by rule key, sorted by key.
    pub rules: Vec<RuleInfo>,
}
