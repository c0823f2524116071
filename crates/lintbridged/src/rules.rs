//! Rule compatibility filtering.
//!
//! Some rules active on the quality server cannot run inside the wrapped
//! engine: rules from the server's own `common-*` repositories are computed
//! server-side, and individual keys can be disabled through configuration.

use std::collections::BTreeSet;

use crate::server::ActiveRule;

const SERVER_COMPUTED_REPOSITORY_PREFIX: &str = "common-";

/// Decides whether a rule may reach engine configuration.
pub trait RuleFilter: Send + Sync {
    /// Returns `true` when the engine can evaluate `rule_key`.
    fn is_supported(&self, rule_key: &str) -> bool;

    /// Keeps the supported rules, preserving order.
    fn retain_supported(&self, rules: Vec<ActiveRule>) -> Vec<ActiveRule> {
        rules
            .into_iter()
            .filter(|rule| self.is_supported(&rule.rule_key))
            .collect()
    }
}

/// Default filter rejecting server-computed repositories and configured keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncompatibleRules {
    keys: BTreeSet<String>,
}

impl IncompatibleRules {
    /// Builds a filter that additionally rejects every key in `keys`.
    #[must_use]
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|key| key.as_ref().trim().to_owned())
                .filter(|key| !key.is_empty())
                .collect(),
        }
    }
}

impl RuleFilter for IncompatibleRules {
    fn is_supported(&self, rule_key: &str) -> bool {
        let repository = rule_key.split_once(':').map_or("", |(repo, _)| repo);
        !repository.starts_with(SERVER_COMPUTED_REPOSITORY_PREFIX) && !self.keys.contains(rule_key)
    }
}
