//! Bucket splitting of a requestAds cycle

use crate::core::config::{AdSlotConfig, BucketConfig};
use std::time::Duration;

/// Slots auctioned together in one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct BucketGroup {
    pub name: String,
    pub timeout: Duration,
    pub slots: Vec<AdSlotConfig>,
}

/// Group slots by bucket, in first-occurrence order of their members
pub fn split_into_buckets(slots: &[AdSlotConfig], buckets: &BucketConfig) -> Vec<BucketGroup> {
    let mut groups: Vec<BucketGroup> = Vec::new();
    for slot in slots {
        let name = slot.bucket_name();
        match groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.slots.push(slot.clone()),
            None => groups.push(BucketGroup {
                name: name.to_string(),
                timeout: buckets.timeout_for(name),
                slots: vec![slot.clone()],
            }),
        }
    }
    groups
}
