//! Observable tag state

use serde::{Deserialize, Serialize};

/// Externally visible view of the tag controller state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum StateSnapshot {
    /// Waiting for `configure()`; `initialize` records an early `requestAds()` call
    Configurable { initialize: bool },

    Configured,

    /// A `requestAds()` cycle is in flight
    #[serde(rename = "requestAds")]
    RequestAds,

    Finished,

    /// Finished in single page application mode, at the recorded location
    SpaFinished { href: String },

    Error { reason: String },
}

impl StateSnapshot {
    pub fn name(&self) -> &'static str {
        match self {
            StateSnapshot::Configurable { .. } => "configurable",
            StateSnapshot::Configured => "configured",
            StateSnapshot::RequestAds => "requestAds",
            StateSnapshot::Finished => "finished",
            StateSnapshot::SpaFinished { .. } => "spa-finished",
            StateSnapshot::Error { .. } => "error",
        }
    }

    /// Whether the last cycle completed without error
    pub fn is_finished(&self) -> bool {
        matches!(self, StateSnapshot::Finished | StateSnapshot::SpaFinished { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StateSnapshot::Error { .. })
    }
}

impl std::fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateSnapshot::Configurable { initialize: true } => write!(f, "configurable (initialize requested)"),
            StateSnapshot::SpaFinished { href } => write!(f, "spa-finished at {}", href),
            StateSnapshot::Error { reason } => write!(f, "error: {}", reason),
            other => f.write_str(other.name()),
        }
    }
}
