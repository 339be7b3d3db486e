//! Pipeline context - per-run values handed to every step

use crate::core::{
    ad_unit_path::{resolve_ad_unit_path, AdUnitPathError},
    config::TagConfig,
    environment::Environment,
    runtime::RuntimeConfig,
    services::{
        AssetLoader, AuctionGovernor, ConsentSnapshot, LabelConfigService, LoggerHandle,
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Bucket a run was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketContext {
    pub name: String,
    pub timeout: Duration,
}

/// Execution context for one pipeline run
///
/// Built fresh for every run and never reused.
#[derive(Clone)]
pub struct PipelineContext {
    /// Correlation id of this run
    pub auction_id: Uuid,

    /// Increases by one with every run of the engine
    pub request_id: u64,

    /// Number of public `requestAds()` calls so far; shared by all bucket runs of a cycle
    pub request_ads_calls: u64,

    pub env: Environment,

    pub config: Arc<TagConfig>,

    pub runtime_config: Arc<RuntimeConfig>,

    /// Resolved ad unit path variables
    pub ad_unit_path_variables: HashMap<String, String>,

    pub consent: ConsentSnapshot,

    pub logger: LoggerHandle,

    pub label_config_service: Arc<dyn LabelConfigService>,

    pub auction: Arc<dyn AuctionGovernor>,

    pub asset_loader: Arc<dyn AssetLoader>,

    pub bucket: Option<BucketContext>,
}

impl PipelineContext {
    /// Whether this is the very first run of the engine in the first cycle
    pub fn is_first_run(&self) -> bool {
        self.request_ads_calls == 1 && self.request_id == 1
    }

    /// Labels active for this run (static followed by runtime labels)
    pub fn active_labels(&self) -> Vec<String> {
        self.runtime_config.active_labels(&self.config)
    }

    /// Resolve a slot's ad unit path with this run's variables
    pub fn resolve_ad_unit_path(&self, path: &str) -> Result<String, AdUnitPathError> {
        resolve_ad_unit_path(path, &self.ad_unit_path_variables)
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("auction_id", &self.auction_id)
            .field("request_id", &self.request_id)
            .field("request_ads_calls", &self.request_ads_calls)
            .field("env", &self.env)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}
