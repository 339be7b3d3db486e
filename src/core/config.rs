//! Tag configuration from YAML or JSON

use crate::core::environment::Environment;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Name of the implicit bucket for slots without `behaviour.bucket`
pub const DEFAULT_BUCKET: &str = "default";

/// Global bucket timeout used when the configuration doesn't set one
pub const DEFAULT_BUCKET_TIMEOUT_MS: u64 = 1000;

/// Top-level tag configuration supplied by the publisher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagConfig {
    /// Configured environment (can be overridden from the page)
    #[serde(default)]
    pub environment: Option<Environment>,

    /// Ad slots on the page
    #[serde(default)]
    pub slots: Vec<AdSlotConfig>,

    /// Static page targeting
    #[serde(default)]
    pub targeting: TargetingConfig,

    /// Bucket splitting
    #[serde(default)]
    pub buckets: BucketConfig,

    /// Single page application mode
    #[serde(default)]
    pub spa: SpaConfig,

    /// Immediately request ads once configured
    #[serde(default)]
    pub request_ads: bool,
}

/// A single ad placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdSlotConfig {
    pub dom_id: String,

    /// Ad unit path, may contain `{name}` placeholders
    pub ad_unit_path: String,

    #[serde(default)]
    pub position: SlotPosition,

    #[serde(default)]
    pub sizes: Vec<[u32; 2]>,

    #[serde(default)]
    pub behaviour: SlotBehaviour,

    /// All of these labels must be active for the slot to be defined
    #[serde(default)]
    pub label_all: Vec<String>,

    /// At least one of these labels must be active (if non-empty)
    #[serde(default)]
    pub label_any: Vec<String>,
}

impl AdSlotConfig {
    /// Bucket this slot belongs to, falling back to the implicit default bucket
    pub fn bucket_name(&self) -> &str {
        self.behaviour.bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }

    pub fn loaded(&self) -> LoadingBehaviour {
        self.behaviour.loaded
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotPosition {
    #[default]
    InPage,
    OutOfPage,
    Interstitial,
}

/// When and how a slot is loaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotBehaviour {
    #[serde(default)]
    pub loaded: LoadingBehaviour,

    #[serde(default)]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingBehaviour {
    /// Requested with every `requestAds()` cycle
    #[default]
    Eager,
    /// Requested only through `refreshAdSlot`
    Manual,
    /// Filled by a separate mechanism
    Backfill,
    /// Template for slots cloned by `refreshInfiniteAdSlot`
    Infinite,
}

impl std::fmt::Display for LoadingBehaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoadingBehaviour::Eager => "eager",
            LoadingBehaviour::Manual => "manual",
            LoadingBehaviour::Backfill => "backfill",
            LoadingBehaviour::Infinite => "infinite",
        };
        f.write_str(name)
    }
}

/// A targeting value, either a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetingValue {
    Single(String),
    Multi(Vec<String>),
}

impl From<&str> for TargetingValue {
    fn from(value: &str) -> Self {
        TargetingValue::Single(value.to_string())
    }
}

impl From<String> for TargetingValue {
    fn from(value: String) -> Self {
        TargetingValue::Single(value)
    }
}

impl From<Vec<String>> for TargetingValue {
    fn from(values: Vec<String>) -> Self {
        TargetingValue::Multi(values)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingConfig {
    #[serde(default)]
    pub key_values: HashMap<String, TargetingValue>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub ad_unit_path_variables: HashMap<String, String>,
}

/// Bucket configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Global timeout in milliseconds
    #[serde(default = "default_bucket_timeout")]
    pub timeout: u64,

    /// Per bucket settings
    #[serde(default)]
    pub bucket: HashMap<String, BucketSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSettings {
    /// Timeout in milliseconds
    pub timeout: u64,
}

fn default_bucket_timeout() -> u64 {
    DEFAULT_BUCKET_TIMEOUT_MS
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: DEFAULT_BUCKET_TIMEOUT_MS,
            bucket: HashMap::new(),
        }
    }
}

impl BucketConfig {
    /// Timeout for a bucket, or the global timeout if the bucket isn't configured
    pub fn timeout_for(&self, name: &str) -> Duration {
        let millis = self
            .bucket
            .get(name)
            .map(|settings| settings.timeout)
            .unwrap_or(self.timeout);
        Duration::from_millis(millis)
    }
}

/// Single page application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub validate_location: ValidateLocation,
}

/// How a navigation is detected between two `requestAds()` calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidateLocation {
    #[default]
    Href,
    Path,
    None,
}

impl std::fmt::Display for ValidateLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidateLocation::Href => "href",
            ValidateLocation::Path => "path",
            ValidateLocation::None => "none",
        };
        f.write_str(name)
    }
}

impl TagConfig {
    /// Load a tag configuration from a YAML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse a tag configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TagConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a tag configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TagConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the tag configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen_ids = HashSet::new();
        for slot in &self.slots {
            if !seen_ids.insert(slot.dom_id.as_str()) {
                anyhow::bail!("Duplicate slot domId: {}", slot.dom_id);
            }
            if slot.ad_unit_path.trim().is_empty() {
                anyhow::bail!("Slot '{}' has an empty adUnitPath", slot.dom_id);
            }
            if self.buckets.enabled {
                if let Some(bucket) = &slot.behaviour.bucket {
                    if !self.buckets.bucket.contains_key(bucket) {
                        tracing::debug!(
                            slot = %slot.dom_id,
                            bucket = %bucket,
                            "bucket not configured, using global timeout"
                        );
                    }
                }
            }
        }

        for (name, settings) in &self.buckets.bucket {
            if settings.timeout == 0 {
                anyhow::bail!("Bucket '{}' has a zero timeout", name);
            }
        }

        Ok(())
    }

    /// Find a slot by its DOM id
    pub fn slot(&self, dom_id: &str) -> Option<&AdSlotConfig> {
        self.slots.iter().find(|slot| slot.dom_id == dom_id)
    }
}
