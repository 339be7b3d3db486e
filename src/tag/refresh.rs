//! Refresh requests and the queues that defer them to the next cycle

use crate::core::{
    config::{AdSlotConfig, LoadingBehaviour, TagConfig},
    services::LoggerHandle,
    state::StateSnapshot,
};
use tokio::sync::oneshot;

const SOURCE: &str = "RefreshQueue";

/// Options of `refresh_ad_slot`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Explicitly allow refreshing a slot with this loading behaviour
    pub loaded: Option<LoadingBehaviour>,
}

impl RefreshOptions {
    pub fn loaded(loaded: LoadingBehaviour) -> Self {
        Self {
            loaded: Some(loaded),
        }
    }
}

/// Result of a refresh call
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Deferred to a later cycle; the ticket settles once that cycle ended
    Queued(RefreshTicket),
    /// An incremental pipeline run was executed right away
    Refreshed,
    /// Nothing to refresh
    Skipped,
    /// The incremental run failed; the controller moved to the error state
    Failed(String),
}

impl RefreshOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            RefreshOutcome::Queued(_) => "queued",
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Skipped => "skipped",
            RefreshOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, RefreshOutcome::Queued(_))
    }
}

/// Completion handle of a queued refresh
#[derive(Debug)]
pub struct RefreshTicket {
    receiver: oneshot::Receiver<StateSnapshot>,
}

impl RefreshTicket {
    /// Wait for the cycle that consumed the refresh
    ///
    /// Returns `None` if the controller was dropped first.
    pub async fn settled(self) -> Option<StateSnapshot> {
        self.receiver.await.ok()
    }
}

/// Sending half of a [`RefreshTicket`]
#[derive(Debug)]
pub(crate) struct Settle(oneshot::Sender<StateSnapshot>);

impl Settle {
    pub(crate) fn settle(self, snapshot: &StateSnapshot) {
        // the caller may have dropped its ticket
        let _ = self.0.send(snapshot.clone());
    }
}

pub(crate) fn ticket() -> (Settle, RefreshTicket) {
    let (sender, receiver) = oneshot::channel();
    (Settle(sender), RefreshTicket { receiver })
}

/// A refresh call as received through the public API
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshRequest {
    Slot {
        dom_id: String,
        options: RefreshOptions,
    },
    Bucket {
        name: String,
    },
    Infinite {
        dom_id: String,
        configured_dom_id: String,
    },
}

/// Refresh requests waiting for the next `requestAds()` cycle
#[derive(Debug, Default)]
pub(crate) struct PendingRefreshes {
    slots: Vec<(String, RefreshOptions, Settle)>,
    buckets: Vec<(String, Settle)>,
    infinite: Vec<(String, String, Settle)>,
}

impl PendingRefreshes {
    pub(crate) fn push(&mut self, request: RefreshRequest, settle: Settle) {
        match request {
            RefreshRequest::Slot { dom_id, options } => self.slots.push((dom_id, options, settle)),
            RefreshRequest::Bucket { name } => self.buckets.push((name, settle)),
            RefreshRequest::Infinite {
                dom_id,
                configured_dom_id,
            } => self.infinite.push((dom_id, configured_dom_id, settle)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() + self.buckets.len() + self.infinite.len()
    }

    pub(crate) fn has_infinite(&self) -> bool {
        !self.infinite.is_empty()
    }

    /// Append the clones of queued infinite slots to the configuration
    ///
    /// Returns the dom ids of the clones; unresolvable requests are dropped.
    pub(crate) fn materialize_infinite_slots(
        &self,
        config: &mut TagConfig,
        logger: &LoggerHandle,
    ) -> Vec<String> {
        let mut dom_ids = Vec::new();
        for (dom_id, configured_dom_id, _) in &self.infinite {
            match clone_infinite_slot(config, dom_id, configured_dom_id) {
                Some(clone) => {
                    append_slot(config, clone);
                    dom_ids.push(dom_id.clone());
                }
                None => logger.warn(
                    SOURCE,
                    &format!(
                        "no infinite slot '{}' to clone for '{}'",
                        configured_dom_id, dom_id
                    ),
                ),
            }
        }
        dom_ids
    }

    /// Slots requested by a cycle, in configuration order
    ///
    /// Every eager slot is part of the passive sweep. Queued refreshes add
    /// the slots they target.
    pub(crate) fn cycle_slots(&self, config: &TagConfig, infinite_dom_ids: &[String]) -> Vec<AdSlotConfig> {
        config
            .slots
            .iter()
            .filter(|slot| {
                slot.loaded() == LoadingBehaviour::Eager
                    || self
                        .slots
                        .iter()
                        .any(|(dom_id, options, _)| *dom_id == slot.dom_id && is_refreshable(slot, options))
                    || self
                        .buckets
                        .iter()
                        .any(|(name, _)| in_refreshable_bucket(slot, name))
                    || infinite_dom_ids.contains(&slot.dom_id)
            })
            .cloned()
            .collect()
    }

    /// Resolve every ticket with the state the cycle ended in
    pub(crate) fn settle_all(self, snapshot: &StateSnapshot) {
        let settles = self
            .slots
            .into_iter()
            .map(|(_, _, settle)| settle)
            .chain(self.buckets.into_iter().map(|(_, settle)| settle))
            .chain(self.infinite.into_iter().map(|(_, _, settle)| settle));
        for settle in settles {
            settle.settle(snapshot);
        }
    }
}

/// Whether `refresh_ad_slot` may request this slot
pub fn is_refreshable(slot: &AdSlotConfig, options: &RefreshOptions) -> bool {
    match slot.loaded() {
        LoadingBehaviour::Manual | LoadingBehaviour::Infinite => true,
        loaded => options.loaded == Some(loaded),
    }
}

fn in_refreshable_bucket(slot: &AdSlotConfig, name: &str) -> bool {
    slot.bucket_name() == name && slot.loaded() != LoadingBehaviour::Backfill
}

/// Slots a `refresh_bucket` call targets, in configuration order
pub fn bucket_slots(config: &TagConfig, name: &str) -> Vec<AdSlotConfig> {
    config
        .slots
        .iter()
        .filter(|slot| in_refreshable_bucket(slot, name))
        .cloned()
        .collect()
}

/// Clone the infinite slot `configured_dom_id` under a new dom id
pub fn clone_infinite_slot(
    config: &TagConfig,
    dom_id: &str,
    configured_dom_id: &str,
) -> Option<AdSlotConfig> {
    config
        .slot(configured_dom_id)
        .filter(|slot| slot.loaded() == LoadingBehaviour::Infinite)
        .map(|slot| AdSlotConfig {
            dom_id: dom_id.to_string(),
            ..slot.clone()
        })
}

/// Add a slot unless its dom id is already configured
pub(crate) fn append_slot(config: &mut TagConfig, slot: AdSlotConfig) {
    if config.slot(&slot.dom_id).is_none() {
        config.slots.push(slot);
    }
}
