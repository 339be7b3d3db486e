//! Error types for pipeline runs and the tag controller

use crate::core::{ad_unit_path::AdUnitPathError, config::ValidateLocation, step::Phase};
use thiserror::Error;

/// Fatal failure of a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{phase} step '{step}' failed: {source}")]
    StepFailed {
        phase: Phase,
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to resolve consent data: {0}")]
    Consent(#[source] anyhow::Error),
}

impl PipelineError {
    /// Phase that failed, if the failure came from a step
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PipelineError::StepFailed { phase, .. } => Some(*phase),
            PipelineError::Consent(_) => None,
        }
    }
}

/// Errors surfaced to callers of the tag controller
#[derive(Debug, Error)]
pub enum TagError {
    #[error("You are trying to refresh ads on the same page, which is not allowed. Using {mode} for validation.")]
    SameLocation { mode: ValidateLocation },

    #[error("Ad unit path '{path}' uses variable '{variable}' which has no value")]
    UnresolvedAdUnitPathVariable { variable: String, path: String },
}

impl From<AdUnitPathError> for TagError {
    fn from(err: AdUnitPathError) -> Self {
        TagError::UnresolvedAdUnitPathVariable {
            variable: err.variable,
            path: err.path,
        }
    }
}
