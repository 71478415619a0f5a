use std::fmt;

use super::domain::{ApplicantId, ApplicationKey, RequirementId};
use super::gateway::GatewayError;
use super::status::{IllegalTransition, RequirementStatus};

/// Unit of write serialization: one application, or one requirement's
/// own fields (status, deadline, edits, deletion).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WriteTarget {
    Requirement(RequirementId),
    Application(ApplicationKey),
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Requirement(id) => write!(f, "requirement {id}"),
            WriteTarget::Application(key) => write!(f, "application {key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFound {
    #[error("requirement {0} not found")]
    Requirement(RequirementId),
    #[error("application {0} not found")]
    Application(ApplicationKey),
}

/// Error surfaced by the store and the transition controller.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
    #[error("a transition is already in flight for {0}")]
    TransitionInProgress(WriteTarget),
    #[error("transition failed: {0}")]
    TransitionFailed(#[source] GatewayError),
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error("{applicant_id} has already applied to {requirement_id}")]
    AlreadyApplied {
        requirement_id: RequirementId,
        applicant_id: ApplicantId,
    },
    #[error("requirement {requirement_id} is {status} and not accepting applications")]
    NotAcceptingApplications {
        requirement_id: RequirementId,
        status: RequirementStatus,
    },
    #[error("failed to load from gateway: {0}")]
    FetchFailed(#[source] GatewayError),
}

impl PipelineError {
    /// Rejected locally before any gateway mutation was attempted.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            PipelineError::IllegalTransition(_)
                | PipelineError::TransitionInProgress(_)
                | PipelineError::AlreadyApplied { .. }
                | PipelineError::NotAcceptingApplications { .. }
        )
    }
}
