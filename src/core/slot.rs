//! Slot definitions created during the defineSlots phase

use crate::core::config::{AdSlotConfig, TargetingValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Live slot handle owned by the ad network
pub trait AdSlotHandle: Send + Sync {
    fn slot_element_id(&self) -> &str;

    fn ad_unit_path(&self) -> &str;

    fn set_targeting(&self, key: &str, value: TargetingValue);

    fn targeting(&self, key: &str) -> Option<TargetingValue>;
}

/// Filters the configured sizes down to the ones supported on this page
pub type SizeFilter = Arc<dyn Fn(&[[u32; 2]]) -> Vec<[u32; 2]> + Send + Sync>;

/// Floor price resolved for a slot
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRule {
    pub price_rule_id: u32,
    pub floor_price: f64,
}

/// Slot configuration paired with its live platform slot
#[derive(Clone)]
pub struct SlotDefinition {
    pub config: AdSlotConfig,
    pub ad_slot: Arc<dyn AdSlotHandle>,
    pub filter_supported_sizes: SizeFilter,
    pub price_rule: Option<PriceRule>,
}

impl SlotDefinition {
    /// Definition with a pass-through size filter and no price rule
    pub fn new(config: AdSlotConfig, ad_slot: Arc<dyn AdSlotHandle>) -> Self {
        Self {
            config,
            ad_slot,
            filter_supported_sizes: Arc::new(|sizes: &[[u32; 2]]| sizes.to_vec()),
            price_rule: None,
        }
    }

    pub fn dom_id(&self) -> &str {
        &self.config.dom_id
    }

    /// Sizes of this slot that pass the size filter
    pub fn supported_sizes(&self) -> Vec<[u32; 2]> {
        (self.filter_supported_sizes)(&self.config.sizes)
    }
}

impl std::fmt::Debug for SlotDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotDefinition")
            .field("dom_id", &self.config.dom_id)
            .field("ad_unit_path", &self.ad_slot.ad_unit_path())
            .field("price_rule", &self.price_rule)
            .finish_non_exhaustive()
    }
}

/// In-memory slot handle
#[derive(Debug)]
pub struct StaticAdSlot {
    dom_id: String,
    ad_unit_path: String,
    targeting: Mutex<HashMap<String, TargetingValue>>,
}

impl StaticAdSlot {
    pub fn new(dom_id: impl Into<String>, ad_unit_path: impl Into<String>) -> Self {
        Self {
            dom_id: dom_id.into(),
            ad_unit_path: ad_unit_path.into(),
            targeting: Mutex::new(HashMap::new()),
        }
    }
}

impl AdSlotHandle for StaticAdSlot {
    fn slot_element_id(&self) -> &str {
        &self.dom_id
    }

    fn ad_unit_path(&self) -> &str {
        &self.ad_unit_path
    }

    fn set_targeting(&self, key: &str, value: TargetingValue) {
        self.targeting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
    }

    fn targeting(&self, key: &str) -> Option<TargetingValue> {
        self.targeting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }
}
