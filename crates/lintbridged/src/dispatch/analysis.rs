//! Operations behind `initialize`, `analyze` and `ruleRetrieve`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use lintbridge_protocol::{AnalyzeRequest, AnalyzeResult, InitializeRequest, RuleRetrieveResult};

use crate::engine::{
    COMPILER_VERSION_PROPERTY, EngineHandle, EngineRequest, TOOLCHAIN_PATH_PROPERTY,
};
use crate::rules::RuleFilter;
use crate::server::{ServerConnector, ServerSettings};
use crate::tracking;

use super::DISPATCH_TARGET;
use super::errors::{AnalysisError, DispatchError, RuleRetrieveError};
use super::session::{ServerBinding, SessionSettings};

/// Collaborators shared by every session.
pub(crate) struct AnalysisServices {
    engine: EngineHandle,
    connector: Arc<dyn ServerConnector>,
    rule_filter: Arc<dyn RuleFilter>,
    request_timeout: Duration,
}

impl AnalysisServices {
    pub(crate) fn new(
        engine: EngineHandle,
        connector: Arc<dyn ServerConnector>,
        rule_filter: Arc<dyn RuleFilter>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            connector,
            rule_filter,
            request_timeout,
        }
    }

    /// Resolves session settings from an `initialize` request.
    pub(crate) fn initialize(
        &self,
        request: &InitializeRequest,
    ) -> Result<SessionSettings, DispatchError> {
        let mut properties = BTreeMap::new();
        properties.insert(
            TOOLCHAIN_PATH_PROPERTY.to_owned(),
            request.toolchain_path.clone(),
        );
        properties.insert(
            COMPILER_VERSION_PROPERTY.to_owned(),
            request.compiler_version.clone(),
        );

        let settings = ServerSettings::from_initialize(request, self.request_timeout)
            .map_err(DispatchError::InvalidSettings)?;
        let server = match settings {
            Some(settings) => {
                let client = self
                    .connector
                    .connect(&settings)
                    .map_err(DispatchError::ServerClient)?;
                info!(
                    target: DISPATCH_TARGET,
                    url = %settings.url,
                    project = %settings.project_key,
                    "quality server configured"
                );
                Some(ServerBinding {
                    project_key: settings.project_key,
                    client,
                })
            }
            None => {
                warn!(
                    target: DISPATCH_TARGET,
                    "no quality server configured; analyses run without active rules or reconciliation"
                );
                None
            }
        };
        Ok(SessionSettings { properties, server })
    }

    /// Runs one analysis for an initialised session.
    pub(crate) fn analyze(
        &self,
        session: &SessionSettings,
        request: &AnalyzeRequest,
    ) -> Result<AnalyzeResult, AnalysisError> {
        let base_dir = &request.base_dir;
        if !base_dir.is_dir() {
            return Err(AnalysisError::invalid_input(format!(
                "base directory '{}' does not exist or is not a directory",
                base_dir.display()
            )));
        }
        let input_files = normalize_inputs(base_dir, &request.input_files);
        if input_files.is_empty() {
            info!(target: DISPATCH_TARGET, "no input files; skipping analysis");
            return Ok(AnalyzeResult::default());
        }

        let active_rules = match &session.server {
            Some(server) => {
                let rules = server.client.active_rules(&server.project_key)?;
                let total = rules.len();
                let kept = self.rule_filter.retain_supported(rules);
                info!(
                    target: DISPATCH_TARGET,
                    active = kept.len(),
                    skipped = total - kept.len(),
                    "active rules loaded"
                );
                kept
            }
            None => {
                warn!(
                    target: DISPATCH_TARGET,
                    "no quality server connection; no rules will be active"
                );
                Vec::new()
            }
        };

        info!(
            target: DISPATCH_TARGET,
            files = input_files.len(),
            base_dir = %base_dir.display(),
            "starting analysis"
        );
        let output = self.engine.analyze(&EngineRequest {
            base_dir: base_dir.clone(),
            input_files: input_files.clone(),
            active_rules,
            properties: session.properties.clone(),
        })?;

        let reported = output.findings.len();
        let issues = match &session.server {
            Some(server) => {
                let findings = server.client.resolve_messages(output.findings)?;
                let resolved = server
                    .client
                    .resolved_findings(&server.project_key, &input_files)?;
                tracking::reconcile(base_dir, findings, resolved)
            }
            None => output.findings,
        };
        info!(
            target: DISPATCH_TARGET,
            reported,
            returned = issues.len(),
            "analysis finished"
        );

        Ok(AnalyzeResult {
            issues,
            log_messages: output.log_messages,
        })
    }

    /// Rule metadata for an initialised session's project.
    pub(crate) fn rules(
        &self,
        session: &SessionSettings,
    ) -> Result<RuleRetrieveResult, RuleRetrieveError> {
        let server = session.server.as_ref().ok_or(RuleRetrieveError::NoServer)?;
        let rules = server.client.rules(&server.project_key)?;
        Ok(RuleRetrieveResult {
            rules: rules.into_values().collect(),
        })
    }
}

/// Makes every input relative to `base_dir` with `/` separators.
///
/// Absolute paths outside `base_dir` are kept as given. Duplicates are
/// dropped, keeping the first occurrence.
pub(crate) fn normalize_inputs(base_dir: &Path, inputs: &[PathBuf]) -> Vec<String> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let relative = if input.is_absolute() {
                input.strip_prefix(base_dir).unwrap_or(input.as_path())
            } else {
                input.as_path()
            };
            to_forward_slashes(relative)
        })
        .filter(|path| !path.is_empty() && seen.insert(path.clone()))
        .collect()
}

fn to_forward_slashes(path: &Path) -> String {
    let mut parts = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::RootDir => absolute = true,
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy()),
            Component::ParentDir => parts.push("..".into()),
            Component::Normal(part) => parts.push(part.to_string_lossy()),
        }
    }
    let joined = parts.join("/");
    if absolute && !matches!(path.components().next(), Some(Component::Prefix(_))) {
        format!("/{joined}")
    } else {
        joined
    }
}
