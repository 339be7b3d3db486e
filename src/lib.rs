//! adtag - ad request orchestration for a single page
//!
//! A phased pipeline engine ([`AdPipeline`]) runs init, configure,
//! defineSlots, prepareRequestAds, requestBids and requestAds steps. The
//! [`TagController`] owns the tag lifecycle around it.

pub mod cli;
pub mod core;
pub mod execution;
pub mod tag;

// Re-export commonly used types
pub use crate::core::{
    AdSlotConfig, LoadingBehaviour, Phase, PipelineConfiguration, PipelineContext, PipelineError,
    StateSnapshot, TagConfig, TagError, TargetingValue,
};
pub use crate::execution::{AdPipeline, PipelineEvent, RunOutcome};
pub use crate::tag::{RefreshOptions, RefreshOutcome, TagController};
