//! Collaborator interfaces consumed by the engine and the tag controller
//!
//! Ad networks, consent resolution, label filtering and the auction governor
//! live outside this crate. They are reached only through the traits below.

use crate::core::{
    config::{AdSlotConfig, TagConfig},
    step::{ConfigureStep, InitStep, PipelineConfiguration, PrepareRequestAdsStep, RequestBidsStep},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Logger used for publisher-facing messages
pub trait TagLogger: Send + Sync {
    fn debug(&self, source: &str, message: &str);
    fn info(&self, source: &str, message: &str);
    fn warn(&self, source: &str, message: &str);
    fn error(&self, source: &str, message: &str);
}

/// Forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TagLogger for TracingLogger {
    fn debug(&self, source: &str, message: &str) {
        tracing::debug!(source, "{}", message);
    }

    fn info(&self, source: &str, message: &str) {
        tracing::info!(source, "{}", message);
    }

    fn warn(&self, source: &str, message: &str) {
        tracing::warn!(source, "{}", message);
    }

    fn error(&self, source: &str, message: &str) {
        tracing::error!(source, "{}", message);
    }
}

/// Shared, swappable logger
///
/// Clones point at the same slot, so `set` is visible to everyone holding a handle.
#[derive(Clone)]
pub struct LoggerHandle {
    inner: Arc<RwLock<Arc<dyn TagLogger>>>,
}

impl LoggerHandle {
    pub fn new(logger: Arc<dyn TagLogger>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(logger)),
        }
    }

    /// Replace the logger for every holder of this handle
    pub fn set(&self, logger: Arc<dyn TagLogger>) {
        let mut slot = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = logger;
    }

    pub fn current(&self) -> Arc<dyn TagLogger> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn debug(&self, source: &str, message: &str) {
        self.current().debug(source, message);
    }

    pub fn info(&self, source: &str, message: &str) {
        self.current().info(source, message);
    }

    pub fn warn(&self, source: &str, message: &str) {
        self.current().warn(source, message);
    }

    pub fn error(&self, source: &str, message: &str) {
        self.current().error(source, message);
    }
}

impl Default for LoggerHandle {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger))
    }
}

impl std::fmt::Debug for LoggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerHandle").finish_non_exhaustive()
    }
}

/// Label and size filtering
pub trait LabelConfigService: Send + Sync {
    /// Whether a slot should be defined given the currently active labels
    fn filter_slot(&self, slot: &AdSlotConfig, active_labels: &[String]) -> bool;

    /// Device label (e.g. `mobile`, `desktop`), used as the `device` path variable
    fn device_label(&self) -> Option<String>;
}

/// Matches `labelAll` / `labelAny` against the active labels
#[derive(Debug, Clone, Default)]
pub struct DefaultLabelConfigService {
    device: Option<String>,
}

impl DefaultLabelConfigService {
    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
        }
    }
}

impl LabelConfigService for DefaultLabelConfigService {
    fn filter_slot(&self, slot: &AdSlotConfig, active_labels: &[String]) -> bool {
        let has = |label: &String| {
            active_labels.contains(label) || self.device.as_ref() == Some(label)
        };
        let all = slot.label_all.iter().all(has);
        let any = slot.label_any.is_empty() || slot.label_any.iter().any(has);
        all && any
    }

    fn device_label(&self) -> Option<String> {
        self.device.clone()
    }
}

/// Bid throttling, bidder disabling and frequency capping predicates
pub trait AuctionGovernor: Send + Sync {
    fn is_slot_throttled(&self, dom_id: &str, ad_unit_path: &str) -> bool;
    fn is_bidder_disabled(&self, dom_id: &str, bidder: &str) -> bool;
    fn is_bidder_frequency_capped_on_slot(&self, dom_id: &str, bidder: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuctionGovernor;

impl AuctionGovernor for NoopAuctionGovernor {
    fn is_slot_throttled(&self, _dom_id: &str, _ad_unit_path: &str) -> bool {
        false
    }

    fn is_bidder_disabled(&self, _dom_id: &str, _bidder: &str) -> bool {
        false
    }

    fn is_bidder_frequency_capped_on_slot(&self, _dom_id: &str, _bidder: &str) -> bool {
        false
    }
}

/// Loads external scripts
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load_script(&self, url: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAssetLoader;

#[async_trait]
impl AssetLoader for NoopAssetLoader {
    async fn load_script(&self, url: &str) -> anyhow::Result<()> {
        tracing::debug!(url, "asset loading disabled");
        Ok(())
    }
}

/// Consent state at the time a run starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentSnapshot {
    pub gdpr_applies: bool,
    pub tc_string: Option<String>,
    pub purpose_consents: HashMap<u8, bool>,
}

impl ConsentSnapshot {
    /// Whether a purpose may be used
    pub fn has_purpose(&self, purpose: u8) -> bool {
        !self.gdpr_applies || self.purpose_consents.get(&purpose).copied().unwrap_or(false)
    }
}

/// Resolves the consent data snapshot
#[async_trait]
pub trait ConsentProvider: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<ConsentSnapshot>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoConsentRequired;

#[async_trait]
impl ConsentProvider for NoConsentRequired {
    async fn snapshot(&self) -> anyhow::Result<ConsentSnapshot> {
        Ok(ConsentSnapshot::default())
    }
}

/// The browser page the tag runs in
pub trait BrowserHost: Send + Sync {
    /// Full location href
    fn href(&self) -> String;

    fn session_storage(&self, key: &str) -> Option<String>;

    fn local_storage(&self, key: &str) -> Option<String>;

    /// Location path, without query and fragment
    fn pathname(&self) -> String {
        split_href(&self.href()).path.to_string()
    }

    fn hostname(&self) -> String {
        split_href(&self.href()).host.to_string()
    }

    fn query_param(&self, name: &str) -> Option<String> {
        let href = self.href();
        split_href(&href)
            .query
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

struct HrefParts<'a> {
    host: &'a str,
    path: &'a str,
    query: &'a str,
}

fn split_href(href: &str) -> HrefParts<'_> {
    let without_fragment = href.split('#').next().unwrap_or_default();
    let (before_query, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));
    let after_scheme = before_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(before_query);
    let (host, path) = match after_scheme.find('/') {
        Some(index) => after_scheme.split_at(index),
        None => (after_scheme, "/"),
    };
    HrefParts { host, path, query }
}

/// In-memory browser host
#[derive(Debug, Default)]
pub struct StaticHost {
    href: RwLock<String>,
    session: HashMap<String, String>,
    local: HashMap<String, String>,
}

impl StaticHost {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: RwLock::new(href.into()),
            session: HashMap::new(),
            local: HashMap::new(),
        }
    }

    pub fn with_session_storage(mut self, key: &str, value: &str) -> Self {
        self.session.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_local_storage(mut self, key: &str, value: &str) -> Self {
        self.local.insert(key.to_string(), value.to_string());
        self
    }

    /// Simulate a navigation
    pub fn navigate(&self, href: impl Into<String>) {
        let mut current = self.href.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = href.into();
    }
}

impl BrowserHost for StaticHost {
    fn href(&self) -> String {
        self.href
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn session_storage(&self, key: &str) -> Option<String> {
        self.session.get(key).cloned()
    }

    fn local_storage(&self, key: &str) -> Option<String> {
        self.local.get(key).cloned()
    }
}

/// Supplies the base step bundle (defineSlots, requestAds and network specific steps)
pub trait AdNetworkAdapter: Send + Sync {
    fn pipeline_configuration(&self, config: &TagConfig) -> PipelineConfiguration;
}

/// A publisher module contributing additional steps
pub trait TagModule: Send + Sync {
    fn name(&self) -> &str;

    /// Called once the tag is configured
    fn configure(&self, _config: &TagConfig) -> anyhow::Result<()> {
        Ok(())
    }

    fn init_steps(&self) -> Vec<InitStep> {
        Vec::new()
    }

    fn configure_steps(&self) -> Vec<ConfigureStep> {
        Vec::new()
    }

    fn prepare_request_ads_steps(&self) -> Vec<PrepareRequestAdsStep> {
        Vec::new()
    }

    fn request_bids_steps(&self) -> Vec<RequestBidsStep> {
        Vec::new()
    }
}

/// Services handed to every pipeline run
#[derive(Clone)]
pub struct PipelineServices {
    pub logger: LoggerHandle,
    pub label_config_service: Arc<dyn LabelConfigService>,
    pub auction: Arc<dyn AuctionGovernor>,
    pub asset_loader: Arc<dyn AssetLoader>,
    pub consent: Arc<dyn ConsentProvider>,
    pub host: Arc<dyn BrowserHost>,
}

impl PipelineServices {
    pub fn with_host(mut self, host: Arc<dyn BrowserHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_label_config_service(mut self, service: Arc<dyn LabelConfigService>) -> Self {
        self.label_config_service = service;
        self
    }

    pub fn with_auction_governor(mut self, auction: Arc<dyn AuctionGovernor>) -> Self {
        self.auction = auction;
        self
    }

    pub fn with_asset_loader(mut self, asset_loader: Arc<dyn AssetLoader>) -> Self {
        self.asset_loader = asset_loader;
        self
    }

    pub fn with_consent_provider(mut self, consent: Arc<dyn ConsentProvider>) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_logger(self, logger: Arc<dyn TagLogger>) -> Self {
        self.logger.set(logger);
        self
    }

    /// `device` and `domain` path variables derived from the page
    pub fn default_ad_unit_path_variables(&self) -> HashMap<String, String> {
        let mut variables = HashMap::new();
        if let Some(device) = self.label_config_service.device_label() {
            variables.insert("device".to_string(), device);
        }
        variables.insert("domain".to_string(), self.host.hostname());
        variables
    }
}

impl Default for PipelineServices {
    fn default() -> Self {
        Self {
            logger: LoggerHandle::default(),
            label_config_service: Arc::new(DefaultLabelConfigService::default()),
            auction: Arc::new(NoopAuctionGovernor),
            asset_loader: Arc::new(NoopAssetLoader),
            consent: Arc::new(NoConsentRequired),
            host: Arc::new(StaticHost::new("https://localhost/")),
        }
    }
}

impl std::fmt::Debug for PipelineServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineServices")
            .field("href", &self.host.href())
            .finish_non_exhaustive()
    }
}
