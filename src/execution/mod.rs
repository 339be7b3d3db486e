//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{AdPipeline, EventHandler, PipelineEvent, RunOutcome, SkipReason};
pub use executor::{ExecutionResult, StepExecutor};
pub use scheduler::{PhaseScheduler, PhaseStrategy, ScheduledStep};
