//! Tag controller state machine data

use crate::core::{
    config::{TagConfig, TargetingValue},
    runtime::{RuntimeConfig, Targeting},
    services::TagModule,
    state::StateSnapshot,
};
use crate::execution::engine::AdPipeline;
use crate::tag::{
    hooks::Hooks,
    navigation::PageLocation,
    refresh::{PendingRefreshes, RefreshRequest, Settle},
};
use std::collections::HashMap;
use std::sync::Arc;

/// A targeting mutation from the public API
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TargetingUpdate {
    KeyValue(String, TargetingValue),
    Label(String),
    AdUnitPathVariables(HashMap<String, String>),
}

impl TargetingUpdate {
    pub(crate) fn apply(self, targeting: &mut Targeting) {
        match self {
            TargetingUpdate::KeyValue(key, value) => targeting.set_key_value(key, value),
            TargetingUpdate::Label(label) => targeting.add_label(label),
            TargetingUpdate::AdUnitPathVariables(variables) => {
                targeting.set_ad_unit_path_variables(variables)
            }
        }
    }
}

/// Call received while a cycle was in flight
#[derive(Debug)]
pub(crate) enum BufferedCall {
    Targeting(TargetingUpdate),
    Refresh(RefreshRequest, Settle),
    /// An immediate refresh started before the cycle failed during it
    RefreshFailed(String),
}

/// Targeting and refreshes deferred to the next cycle in SPA mode
#[derive(Debug, Default)]
pub(crate) struct NextCycle {
    pub targeting: Targeting,
    pub refreshes: PendingRefreshes,
}

pub(crate) struct ConfigurableState {
    pub targeting: Targeting,
    pub pending: PendingRefreshes,
    pub modules: Vec<Arc<dyn TagModule>>,
    pub hooks: Hooks,
    pub initialize: bool,
}

pub(crate) struct ConfiguredState {
    pub config: Arc<TagConfig>,
    pub runtime_config: RuntimeConfig,
    pub modules: Vec<Arc<dyn TagModule>>,
    pub hooks: Hooks,
    pub pending: PendingRefreshes,
}

pub(crate) struct InProgressState {
    pub config: Arc<TagConfig>,
    pub runtime_config: RuntimeConfig,
    pub buffered: Vec<BufferedCall>,
}

pub(crate) struct FinishedState {
    pub config: Arc<TagConfig>,
    pub runtime_config: RuntimeConfig,
    pub modules: Vec<Arc<dyn TagModule>>,
    pub hooks: Hooks,
    pub engine: Arc<AdPipeline>,
}

pub(crate) struct SpaFinishedState {
    pub config: Arc<TagConfig>,
    pub runtime_config: RuntimeConfig,
    pub next: NextCycle,
    pub last_location: PageLocation,
    pub modules: Vec<Arc<dyn TagModule>>,
    pub hooks: Hooks,
    pub engine: Arc<AdPipeline>,
}

/// Everything a fresh `requestAds()` needs to recover from an error
pub(crate) struct ResumeContext {
    pub config: Arc<TagConfig>,
    pub runtime_config: RuntimeConfig,
    pub modules: Vec<Arc<dyn TagModule>>,
    pub hooks: Hooks,
    pub engine: Arc<AdPipeline>,
    pub pending: PendingRefreshes,
}

pub(crate) struct ErrorState {
    pub reason: String,
    pub resume: ResumeContext,
}

/// The single state value of a tag controller
pub(crate) enum TagState {
    Configurable(ConfigurableState),
    Configured(ConfiguredState),
    RequestAdsInProgress(InProgressState),
    Finished(FinishedState),
    SpaFinished(SpaFinishedState),
    Error(ErrorState),
}

impl Default for TagState {
    fn default() -> Self {
        TagState::Configurable(ConfigurableState {
            targeting: Targeting::default(),
            pending: PendingRefreshes::default(),
            modules: Vec::new(),
            hooks: Hooks::default(),
            initialize: false,
        })
    }
}

impl TagState {
    pub(crate) fn snapshot(&self) -> StateSnapshot {
        match self {
            TagState::Configurable(state) => StateSnapshot::Configurable {
                initialize: state.initialize,
            },
            TagState::Configured(_) => StateSnapshot::Configured,
            TagState::RequestAdsInProgress(_) => StateSnapshot::RequestAds,
            TagState::Finished(_) => StateSnapshot::Finished,
            TagState::SpaFinished(state) => StateSnapshot::SpaFinished {
                href: state.last_location.href.clone(),
            },
            TagState::Error(state) => StateSnapshot::Error {
                reason: state.reason.clone(),
            },
        }
    }

    pub(crate) fn config(&self) -> Option<&Arc<TagConfig>> {
        match self {
            TagState::Configurable(_) => None,
            TagState::Configured(state) => Some(&state.config),
            TagState::RequestAdsInProgress(state) => Some(&state.config),
            TagState::Finished(state) => Some(&state.config),
            TagState::SpaFinished(state) => Some(&state.config),
            TagState::Error(state) => Some(&state.resume.config),
        }
    }

    pub(crate) fn runtime_config(&self) -> Option<&RuntimeConfig> {
        match self {
            TagState::Configurable(_) => None,
            TagState::Configured(state) => Some(&state.runtime_config),
            TagState::RequestAdsInProgress(state) => Some(&state.runtime_config),
            TagState::Finished(state) => Some(&state.runtime_config),
            TagState::SpaFinished(state) => Some(&state.runtime_config),
            TagState::Error(state) => Some(&state.resume.runtime_config),
        }
    }
}
