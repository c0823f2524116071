//! Per-connection session state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::server::QualityServer;

/// Quality server bound to an initialised session.
#[derive(Clone)]
pub(crate) struct ServerBinding {
    pub(crate) project_key: String,
    pub(crate) client: Arc<dyn QualityServer>,
}

impl fmt::Debug for ServerBinding {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServerBinding")
            .field("project_key", &self.project_key)
            .finish_non_exhaustive()
    }
}

/// Settings captured by a successful `initialize`.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionSettings {
    /// Engine properties forwarded with every analysis.
    pub(crate) properties: BTreeMap<String, String>,
    /// Quality server, when the request named one.
    pub(crate) server: Option<ServerBinding>,
}

/// `Uninitialized -> Initialized` on a successful initialize. A later
/// initialize replaces the settings; only a new connection starts over.
#[derive(Debug, Default)]
pub(crate) enum SessionState {
    #[default]
    Uninitialized,
    Initialized(SessionSettings),
}

impl SessionState {
    pub(crate) fn initialize(&mut self, settings: SessionSettings) {
        *self = Self::Initialized(settings);
    }

    pub(crate) const fn settings(&self) -> Option<&SessionSettings> {
        match self {
            Self::Uninitialized => None,
            Self::Initialized(settings) => Some(settings),
        }
    }
}
