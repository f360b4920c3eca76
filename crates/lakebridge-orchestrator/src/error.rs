//! Orchestrator error types.

use thiserror::Error;

use lakebridge_core::{CoreError, PipelineId};
use lakebridge_platform::PlatformError;

use crate::provisioner::ProvisionStep;
use crate::resolver::ResourceKind;
use crate::restart::RestartPhase;

/// Errors propagated by the provisioner, toggle, and maintenance operations.
///
/// Teardown never returns one of these; see [`crate::teardown::TeardownReport`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    #[error(transparent)]
    InvalidIdentifier(#[from] CoreError),

    #[error("step {step} failed for {resource} (completed: {completed:?}): {source}")]
    Provision {
        step: ProvisionStep,
        resource: String,
        completed: Vec<ProvisionStep>,
        source: PlatformError,
    },

    #[error("pipeline {pipeline_id} restart failed in {phase} phase: {source}")]
    Restart {
        phase: RestartPhase,
        pipeline_id: PipelineId,
        source: PlatformError,
    },

    #[error("bucket {bucket} has no {kind}")]
    NotConnected { bucket: String, kind: ResourceKind },

    #[error("lookup of {kind} failed: {source}")]
    Lookup {
        kind: ResourceKind,
        source: PlatformError,
    },

    #[error("catalog table {0} does not match any replicable source table")]
    UnknownTable(String),

    #[error("failed to update publication {name}: {source}")]
    Publication { name: String, source: PlatformError },

    #[error("pipeline {0} reported failed")]
    PipelineFailed(PipelineId),

    #[error("pipeline {0} is stopped")]
    PipelineStopped(PipelineId),

    #[error("{operation} failed: {source}")]
    Platform {
        operation: &'static str,
        source: PlatformError,
    },
}

impl OrchestratorError {
    pub(crate) fn platform(operation: &'static str) -> impl FnOnce(PlatformError) -> Self {
        move |source| Self::Platform { operation, source }
    }

    /// The provisioning step this error originated from, if any.
    pub fn failed_step(&self) -> Option<ProvisionStep> {
        match self {
            Self::Provision { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The restart phase this error originated from, if any.
    pub fn restart_phase(&self) -> Option<RestartPhase> {
        match self {
            Self::Restart { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Result type alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
