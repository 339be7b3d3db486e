//! Phase scheduler - decides how the steps of one phase are run

use crate::core::step::{Phase, StepFuture};
use crate::execution::executor::{ExecutionResult, StepExecutor};
use futures::future::join_all;

/// How the steps of a phase are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStrategy {
    /// One step at a time; a step is only started once its predecessor settled
    Sequential,

    /// All steps started together; the phase settles once every step settled
    Concurrent,
}

impl PhaseStrategy {
    /// Fixed strategy table of the engine
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::RequestBids => PhaseStrategy::Concurrent,
            Phase::Init
            | Phase::Configure
            | Phase::DefineSlots
            | Phase::PrepareRequestAds
            | Phase::RequestAds => PhaseStrategy::Sequential,
        }
    }
}

/// A step whose task has not been created yet
pub struct ScheduledStep {
    pub name: String,
    start: Box<dyn FnOnce() -> StepFuture + Send>,
}

impl ScheduledStep {
    pub fn new<F>(name: impl Into<String>, start: F) -> Self
    where
        F: FnOnce() -> StepFuture + Send + 'static,
    {
        Self {
            name: name.into(),
            start: Box::new(start),
        }
    }

    /// Create the step's task
    pub fn start(self) -> (String, StepFuture) {
        (self.name, (self.start)())
    }
}

impl std::fmt::Debug for ScheduledStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledStep").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Runs the steps of a single phase
#[derive(Debug, Clone, Copy)]
pub struct PhaseScheduler {
    phase: Phase,
    strategy: PhaseStrategy,
}

impl PhaseScheduler {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            strategy: PhaseStrategy::for_phase(phase),
        }
    }

    pub fn strategy(&self) -> PhaseStrategy {
        self.strategy
    }

    /// Run the steps, returning one result per step that was started
    ///
    /// Sequential phases stop at the first failure. Concurrent phases wait for
    /// every step, results stay in registration order.
    pub async fn run(
        &self,
        steps: Vec<ScheduledStep>,
        executor: &StepExecutor,
    ) -> Vec<ExecutionResult> {
        match self.strategy {
            PhaseStrategy::Sequential => {
                let mut results = Vec::with_capacity(steps.len());
                for step in steps {
                    let result = executor.execute(self.phase, step).await;
                    let failed = result.is_failure();
                    results.push(result);
                    if failed {
                        break;
                    }
                }
                results
            }
            PhaseStrategy::Concurrent => {
                join_all(steps.into_iter().map(|step| executor.execute(self.phase, step))).await
            }
        }
    }
}
