//! Remote quality-server access.
//!
//! The service needs four operations from the quality server: the active rule
//! set for a project, the findings already resolved for a set of files, the
//! final message text for findings whose engine message is empty, and rule
//! metadata for editor display. [`QualityServer`] names those operations;
//! [`SonarQubeServer`] implements them over the SonarQube web API.

mod sonarqube;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use lintbridge_protocol::{Finding, InitializeRequest, RuleInfo, TextRange};

pub use self::sonarqube::{SonarQubeConnector, SonarQubeServer};

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Rule enabled in the project's quality profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRule {
    /// Fully qualified rule key, `repository:rule`.
    pub rule_key: String,
    /// Language the rule applies to.
    pub language_key: String,
    /// Parameter overrides from the quality profile.
    pub params: BTreeMap<String, String>,
}

impl ActiveRule {
    /// Builds an active rule without parameters.
    #[must_use]
    pub fn new(rule_key: impl Into<String>, language_key: impl Into<String>) -> Self {
        Self {
            rule_key: rule_key.into(),
            language_key: language_key.into(),
            params: BTreeMap::new(),
        }
    }
}

/// Finding the quality server already knows as resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFinding {
    /// Server-side issue key.
    pub key: String,
    /// Fully qualified rule key.
    pub rule_key: String,
    /// Path relative to the project root, `/`-separated.
    pub file: String,
    /// Message recorded by the server.
    pub message: String,
    /// First line, absent for file-level issues.
    pub line: Option<u32>,
    /// Exact location, when the server recorded one.
    pub range: Option<TextRange>,
    /// Checksum of the flagged line's content.
    pub line_hash: Option<String>,
    /// Resolution marker, e.g. `FALSE-POSITIVE` or `WONTFIX`.
    pub resolution: String,
}

/// Errors raised while talking to the quality server.
#[derive(Debug, Error)]
pub enum QualityServerError {
    /// The configured server URL did not parse.
    #[error("invalid quality server URL '{url}': {source}")]
    InvalidUrl {
        /// Configured URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The server could not be reached.
    #[error("quality server at {url} is unreachable: {source}")]
    Unreachable {
        /// Requested URL.
        url: String,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The server refused the credentials.
    #[error("quality server rejected the request to {url} with HTTP {status}; check the API token")]
    Unauthorized {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The server answered with an unexpected status or body.
    #[error("unexpected response from {url}: {message}")]
    BadResponse {
        /// Requested URL.
        url: String,
        /// What was wrong with the response.
        message: String,
    },
}

/// Operations the service needs from the remote quality server.
pub trait QualityServer: Send + Sync {
    /// Rules active for `project_key`.
    ///
    /// # Errors
    ///
    /// Returns a [`QualityServerError`] when the server cannot be queried.
    fn active_rules(&self, project_key: &str) -> Result<Vec<ActiveRule>, QualityServerError>;

    /// Resolved findings recorded for `files` in `project_key`.
    ///
    /// # Errors
    ///
    /// Returns a [`QualityServerError`] when the server cannot be queried.
    fn resolved_findings(
        &self,
        project_key: &str,
        files: &[String],
    ) -> Result<Vec<ResolvedFinding>, QualityServerError>;

    /// Fills in the final message text of findings that carry none.
    ///
    /// # Errors
    ///
    /// Returns a [`QualityServerError`] when rule descriptions cannot be read.
    fn resolve_messages(&self, findings: Vec<Finding>) -> Result<Vec<Finding>, QualityServerError>;

    /// Metadata for every rule active in `project_key`, keyed by rule key.
    ///
    /// # Errors
    ///
    /// Returns a [`QualityServerError`] when the server cannot be queried.
    fn rules(&self, project_key: &str) -> Result<BTreeMap<String, RuleInfo>, QualityServerError>;
}

/// Connection settings for a quality server.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Base URL, always ending in `/`.
    pub url: Url,
    /// Project key on the server.
    pub project_key: String,
    /// Bearer token, if the server needs one.
    pub api_token: Option<String>,
    /// Language key used to pick quality profiles.
    pub language_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ServerSettings {
    /// Extracts server settings from an `initialize` request.
    ///
    /// Returns `Ok(None)` when the request names no server URL or no project
    /// key; the session then analyses without a quality server.
    ///
    /// # Errors
    ///
    /// Returns [`QualityServerError::InvalidUrl`] for an unparsable URL.
    pub fn from_initialize(
        request: &InitializeRequest,
        timeout: Duration,
    ) -> Result<Option<Self>, QualityServerError> {
        let Some(raw_url) = non_blank(request.server_url.as_deref()) else {
            return Ok(None);
        };
        let Some(project_key) = non_blank(request.project_key.as_deref()) else {
            return Ok(None);
        };
        let mut url = Url::parse(raw_url).map_err(|source| QualityServerError::InvalidUrl {
            url: raw_url.to_owned(),
            source,
        })?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Some(Self {
            url,
            project_key: project_key.to_owned(),
            api_token: non_blank(request.api_token.as_deref()).map(str::to_owned),
            language_key: non_blank(request.language_key.as_deref()).map(str::to_owned),
            timeout,
        }))
    }
}

impl fmt::Debug for ServerSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServerSettings")
            .field("url", &self.url.as_str())
            .field("project_key", &self.project_key)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("language_key", &self.language_key)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Creates quality-server clients for initialised sessions.
pub trait ServerConnector: Send + Sync {
    /// Builds a client for `settings`.
    ///
    /// # Errors
    ///
    /// Returns a [`QualityServerError`] when the client cannot be built.
    fn connect(&self, settings: &ServerSettings)
    -> Result<Arc<dyn QualityServer>, QualityServerError>;
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}
