//! Core domain models for the ad tag
//!
//! Configuration, the per-run pipeline context, step records and the
//! collaborator interfaces the engine and the tag controller consume.

pub mod ad_unit_path;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod runtime;
pub mod services;
pub mod slot;
pub mod state;
pub mod step;

pub use ad_unit_path::{resolve_ad_unit_path, AdUnitPathError};
pub use config::{AdSlotConfig, LoadingBehaviour, TagConfig, TargetingValue, ValidateLocation};
pub use context::{BucketContext, PipelineContext};
pub use environment::Environment;
pub use error::{PipelineError, TagError};
pub use runtime::{RuntimeConfig, Targeting};
pub use slot::{AdSlotHandle, SlotDefinition, StaticAdSlot};
pub use state::StateSnapshot;
pub use step::*;
