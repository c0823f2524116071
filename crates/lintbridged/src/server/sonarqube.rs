//! SonarQube web API client.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use lintbridge_protocol::{Finding, RuleInfo, TextRange};

use super::{
    ActiveRule, QualityServer, QualityServerError, ResolvedFinding, SERVER_TARGET, ServerConnector,
    ServerSettings,
};

const PAGE_SIZE: usize = 500;
const MAX_PAGES: usize = 40;
/// Files per issue query; keeps the query string a sensible length.
const FILES_PER_QUERY: usize = 50;

/// Builds [`SonarQubeServer`] clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct SonarQubeConnector;

impl ServerConnector for SonarQubeConnector {
    fn connect(
        &self,
        settings: &ServerSettings,
    ) -> Result<Arc<dyn QualityServer>, QualityServerError> {
        Ok(Arc::new(SonarQubeServer::new(settings)?))
    }
}

/// Blocking client for the handful of SonarQube endpoints the service uses.
#[derive(Debug, Clone)]
pub struct SonarQubeServer {
    client: Client,
    base: Url,
    token: Option<String>,
    language_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProfilesPage {
    #[serde(default)]
    profiles: Vec<Profile>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    key: String,
    #[serde(default)]
    language: String,
}

#[derive(Debug, Deserialize)]
struct RulesPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default)]
    actives: HashMap<String, Vec<Activation>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RuleEntry {
    key: String,
    #[serde(default)]
    lang: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    rule_type: String,
    #[serde(default)]
    severity: String,
}

#[derive(Debug, Default, Deserialize)]
struct Activation {
    #[serde(default)]
    params: Vec<ActivationParam>,
}

#[derive(Debug, Deserialize)]
struct ActivationParam {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct IssuesPage {
    #[serde(default)]
    paging: Paging,
    #[serde(default)]
    issues: Vec<IssueEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct Paging {
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueEntry {
    key: String,
    rule: String,
    component: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    text_range: Option<RangeEntry>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    resolution: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeEntry {
    start_line: u32,
    start_offset: u32,
    end_line: u32,
    end_offset: u32,
}

#[derive(Debug, Deserialize)]
struct RuleShow {
    rule: RuleEntry,
}

/// One activated rule together with the profile it came from.
struct ProfileRule {
    profile_language: String,
    rule: RuleEntry,
    params: BTreeMap<String, String>,
}

impl SonarQubeServer {
    /// Builds a client for `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`QualityServerError::Client`] when the TLS backend fails to
    /// initialise.
    pub fn new(settings: &ServerSettings) -> Result<Self, QualityServerError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(QualityServerError::Client)?;
        Ok(Self {
            client,
            base: settings.url.clone(),
            token: settings.api_token.clone(),
            language_key: settings.language_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, QualityServerError> {
        self.base
            .join(path)
            .map_err(|source| QualityServerError::InvalidUrl {
                url: format!("{}{path}", self.base),
                source,
            })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, QualityServerError> {
        let url = self.endpoint(path)?;
        let request_url = url.to_string();
        let mut request = self.client.get(url).query(params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(target: SERVER_TARGET, url = %request_url, "querying quality server");
        let response = request
            .send()
            .map_err(|source| QualityServerError::Unreachable {
                url: request_url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(QualityServerError::Unauthorized {
                url: request_url,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(QualityServerError::BadResponse {
                url: request_url,
                message: format!("HTTP {status}"),
            });
        }
        response
            .json::<T>()
            .map_err(|error| QualityServerError::BadResponse {
                url: request_url,
                message: error.to_string(),
            })
    }

    /// Fetches every page of a paginated endpoint.
    fn get_all<P, T, F>(
        &self,
        path: &str,
        params: &[(&str, String)],
        mut split: F,
    ) -> Result<Vec<T>, QualityServerError>
    where
        P: DeserializeOwned,
        F: FnMut(P) -> (usize, Vec<T>),
    {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let mut paged = params.to_vec();
            paged.push(("p", page.to_string()));
            paged.push(("ps", PAGE_SIZE.to_string()));
            let (total, batch) = split(self.get_json::<P>(path, &paged)?);
            let fetched = batch.len();
            items.extend(batch);
            if fetched == 0 || items.len() >= total {
                break;
            }
        }
        Ok(items)
    }

    fn profiles(&self, project_key: &str) -> Result<Vec<Profile>, QualityServerError> {
        let mut params = vec![("project", project_key.to_owned())];
        if let Some(language) = &self.language_key {
            params.push(("language", language.clone()));
        }
        let page: ProfilesPage = self.get_json("api/qualityprofiles/search", &params)?;
        Ok(page.profiles)
    }

    fn profile_rules(&self, project_key: &str) -> Result<Vec<ProfileRule>, QualityServerError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();
        for profile in self.profiles(project_key)? {
            let params = [
                ("qprofile", profile.key.clone()),
                ("activation", String::from("true")),
                ("f", String::from("name,lang,type,severity,actives")),
            ];
            let batch = self.get_all("api/rules/search", &params, |page: RulesPage| {
                let mut actives = page.actives;
                let entries = page
                    .rules
                    .into_iter()
                    .map(|rule| {
                        let activation = actives.remove(&rule.key).unwrap_or_default();
                        (rule, activation)
                    })
                    .collect();
                (page.total, entries)
            })?;
            for (rule, activations) in batch {
                if !seen.insert(rule.key.clone()) {
                    continue;
                }
                let params = activations
                    .into_iter()
                    .flat_map(|activation| activation.params)
                    .map(|param| (param.key, param.value))
                    .collect();
                rules.push(ProfileRule {
                    profile_language: profile.language.clone(),
                    rule,
                    params,
                });
            }
        }
        Ok(rules)
    }

    fn rule_name(&self, rule_key: &str) -> Result<String, QualityServerError> {
        let shown: RuleShow = self.get_json("api/rules/show", &[("key", rule_key.to_owned())])?;
        Ok(shown.rule.name)
    }
}

impl QualityServer for SonarQubeServer {
    fn active_rules(&self, project_key: &str) -> Result<Vec<ActiveRule>, QualityServerError> {
        let rules = self.profile_rules(project_key)?;
        Ok(rules
            .into_iter()
            .map(|entry| {
                let language_key = if entry.rule.lang.is_empty() {
                    entry.profile_language
                } else {
                    entry.rule.lang
                };
                ActiveRule {
                    rule_key: entry.rule.key,
                    language_key,
                    params: entry.params,
                }
            })
            .collect())
    }

    fn resolved_findings(
        &self,
        project_key: &str,
        files: &[String],
    ) -> Result<Vec<ResolvedFinding>, QualityServerError> {
        let prefix = format!("{project_key}:");
        let mut resolved = Vec::new();
        for chunk in files.chunks(FILES_PER_QUERY) {
            let components = chunk
                .iter()
                .map(|file| format!("{prefix}{file}"))
                .collect::<Vec<_>>()
                .join(",");
            let params = [
                ("components", components),
                ("resolved", String::from("true")),
            ];
            let issues = self.get_all("api/issues/search", &params, |page: IssuesPage| {
                (page.paging.total, page.issues)
            })?;
            resolved.extend(
                issues
                    .into_iter()
                    .map(|issue| resolved_finding(issue, &prefix)),
            );
        }
        Ok(resolved)
    }

    fn resolve_messages(&self, findings: Vec<Finding>) -> Result<Vec<Finding>, QualityServerError> {
        let mut names: HashMap<String, String> = HashMap::new();
        findings
            .into_iter()
            .map(|mut finding| {
                if finding.message.trim().is_empty() {
                    let name = match names.get(&finding.rule_key) {
                        Some(name) => name.clone(),
                        None => {
                            let fetched = self.rule_name(&finding.rule_key)?;
                            names.insert(finding.rule_key.clone(), fetched.clone());
                            fetched
                        }
                    };
                    finding.message = name;
                }
                Ok(finding)
            })
            .collect()
    }

    fn rules(&self, project_key: &str) -> Result<BTreeMap<String, RuleInfo>, QualityServerError> {
        Ok(self
            .profile_rules(project_key)?
            .into_iter()
            .map(|entry| {
                let info = RuleInfo {
                    key: entry.rule.key.clone(),
                    name: entry.rule.name,
                    rule_type: entry.rule.rule_type,
                    severity: entry.rule.severity,
                };
                (entry.rule.key, info)
            })
            .collect())
    }
}

fn resolved_finding(issue: IssueEntry, prefix: &str) -> ResolvedFinding {
    let file = issue
        .component
        .strip_prefix(prefix)
        .map_or_else(|| issue.component.clone(), str::to_owned);
    let range = issue.text_range.map(|range| {
        TextRange::new(
            range.start_line,
            range.start_offset,
            range.end_line,
            range.end_offset,
        )
    });
    ResolvedFinding {
        key: issue.key,
        rule_key: issue.rule,
        file,
        message: issue.message,
        line: issue.line.or_else(|| range.map(|known| known.start_line)),
        range,
        line_hash: issue.hash.filter(|hash| !hash.is_empty()),
        resolution: issue.resolution,
    }
}
