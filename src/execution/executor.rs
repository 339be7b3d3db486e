//! Step executor - runs individual steps of a pipeline run

use crate::core::{error::PipelineError, step::Phase, step::StepResult};
use crate::execution::scheduler::ScheduledStep;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of executing a step
#[derive(Debug)]
pub struct ExecutionResult {
    pub phase: Phase,
    pub step: String,
    pub elapsed: Duration,
    pub outcome: StepResult,
}

impl ExecutionResult {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    /// Convert a failed step into the fatal run error
    pub fn into_error(self) -> Option<PipelineError> {
        match self.outcome {
            Ok(()) => None,
            Err(source) => Some(PipelineError::StepFailed {
                phase: self.phase,
                step: self.step,
                source,
            }),
        }
    }
}

/// Executes a single step of one pipeline run
#[derive(Debug, Clone, Copy)]
pub struct StepExecutor {
    request_id: u64,
}

impl StepExecutor {
    pub fn new(request_id: u64) -> Self {
        Self { request_id }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Start the step and wait for its task to settle
    pub async fn execute(&self, phase: Phase, step: ScheduledStep) -> ExecutionResult {
        let started = Instant::now();
        let (name, task) = step.start();
        debug!(request_id = self.request_id, %phase, step = %name, "Executing step");

        let outcome = task.await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(()) => debug!(
                request_id = self.request_id,
                %phase,
                step = %name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Step completed"
            ),
            Err(e) => warn!(
                request_id = self.request_id,
                %phase,
                step = %name,
                "Step failed: {:#}",
                e
            ),
        }

        ExecutionResult {
            phase,
            step: name,
            elapsed,
            outcome,
        }
    }
}
