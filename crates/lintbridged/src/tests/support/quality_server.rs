//! In-memory quality server and connector doubles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lintbridge_protocol::{Finding, RuleInfo};

use crate::server::{
    ActiveRule, QualityServer, QualityServerError, ResolvedFinding, ServerConnector,
    ServerSettings,
};

/// Quality server answering from canned data.
#[derive(Debug, Default)]
pub struct FakeQualityServer {
    active_rules: Mutex<Vec<ActiveRule>>,
    resolved: Mutex<Vec<ResolvedFinding>>,
    rule_names: Mutex<BTreeMap<String, String>>,
    unreachable: AtomicBool,
    resolved_queries: Mutex<Vec<Vec<String>>>,
}

impl FakeQualityServer {
    pub fn set_active_rules(&self, rules: Vec<ActiveRule>) {
        *self.active_rules.lock().expect("rules lock") = rules;
    }

    pub fn set_resolved(&self, resolved: Vec<ResolvedFinding>) {
        *self.resolved.lock().expect("resolved lock") = resolved;
    }

    pub fn set_rule_name(&self, rule_key: &str, name: &str) {
        self.rule_names
            .lock()
            .expect("names lock")
            .insert(rule_key.to_owned(), name.to_owned());
    }

    /// Makes every later call fail as unreachable.
    pub fn go_offline(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    /// File lists passed to `resolved_findings`, in call order.
    #[must_use]
    pub fn resolved_queries(&self) -> Vec<Vec<String>> {
        self.resolved_queries.lock().expect("queries lock").clone()
    }

    fn check_online(&self) -> Result<(), QualityServerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(QualityServerError::BadResponse {
                url: String::from("http://quality.test/"),
                message: String::from("server offline"),
            });
        }
        Ok(())
    }
}

impl QualityServer for FakeQualityServer {
    fn active_rules(&self, _project_key: &str) -> Result<Vec<ActiveRule>, QualityServerError> {
        self.check_online()?;
        Ok(self.active_rules.lock().expect("rules lock").clone())
    }

    fn resolved_findings(
        &self,
        _project_key: &str,
        files: &[String],
    ) -> Result<Vec<ResolvedFinding>, QualityServerError> {
        self.check_online()?;
        self.resolved_queries
            .lock()
            .expect("queries lock")
            .push(files.to_vec());
        Ok(self
            .resolved
            .lock()
            .expect("resolved lock")
            .iter()
            .filter(|resolved| files.contains(&resolved.file))
            .cloned()
            .collect())
    }

    fn resolve_messages(&self, findings: Vec<Finding>) -> Result<Vec<Finding>, QualityServerError> {
        self.check_online()?;
        let names = self.rule_names.lock().expect("names lock");
        Ok(findings
            .into_iter()
            .map(|mut finding| {
                if finding.message.is_empty()
                    && let Some(name) = names.get(&finding.rule_key)
                {
                    finding.message.clone_from(name);
                }
                finding
            })
            .collect())
    }

    fn rules(&self, _project_key: &str) -> Result<BTreeMap<String, RuleInfo>, QualityServerError> {
        self.check_online()?;
        let names = self.rule_names.lock().expect("names lock");
        Ok(self
            .active_rules
            .lock()
            .expect("rules lock")
            .iter()
            .map(|rule| {
                let info = RuleInfo {
                    key: rule.rule_key.clone(),
                    name: names.get(&rule.rule_key).cloned().unwrap_or_default(),
                    rule_type: String::from("CODE_SMELL"),
                    severity: String::from("MAJOR"),
                };
                (rule.rule_key.clone(), info)
            })
            .collect())
    }
}

/// Connector handing out one shared [`FakeQualityServer`].
#[derive(Debug, Default)]
pub struct FakeConnector {
    server: Arc<FakeQualityServer>,
    connections: Mutex<Vec<ServerSettings>>,
}

impl FakeConnector {
    #[must_use]
    pub fn new() -> (Arc<Self>, Arc<FakeQualityServer>) {
        let connector = Arc::new(Self::default());
        let server = Arc::clone(&connector.server);
        (connector, server)
    }

    /// Settings of every connection made so far.
    #[must_use]
    pub fn connections(&self) -> Vec<ServerSettings> {
        self.connections.lock().expect("connections lock").clone()
    }
}

impl ServerConnector for FakeConnector {
    fn connect(
        &self,
        settings: &ServerSettings,
    ) -> Result<Arc<dyn QualityServer>, QualityServerError> {
        self.connections
            .lock()
            .expect("connections lock")
            .push(settings.clone());
        let server: Arc<dyn QualityServer> = self.server.clone();
        Ok(server)
    }
}
