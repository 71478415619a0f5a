use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    ApplicantId, Application, OwnerId, Requirement, RequirementId, RequirementPayload,
    TransitionExtra,
};
use super::status::{ApplicationStatus, RequirementStatus};

/// Remote job/profile service. Storage, business validation and transport
/// all live behind this trait; the pipeline only sees these calls.
#[async_trait]
pub trait JobGateway: Send + Sync + 'static {
    async fn fetch_requirement(&self, id: &RequirementId) -> Result<Requirement, GatewayError>;

    async fn fetch_requirements_by_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Vec<Requirement>, GatewayError>;

    /// Worker-facing browse listing.
    async fn fetch_all_requirements(&self) -> Result<Vec<Requirement>, GatewayError>;

    /// Creates when `payload.id` is `None`, updates otherwise.
    async fn create_or_update_requirement(
        &self,
        payload: RequirementPayload,
    ) -> Result<Requirement, GatewayError>;

    /// `deadline` of `None` leaves the stored deadline untouched.
    async fn set_requirement_status(
        &self,
        id: &RequirementId,
        status: RequirementStatus,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Requirement, GatewayError>;

    async fn delete_requirement(&self, id: &RequirementId) -> Result<(), GatewayError>;

    async fn submit_application(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
    ) -> Result<Application, GatewayError>;

    async fn set_application_status(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
        status: ApplicationStatus,
        extra: &TransitionExtra,
    ) -> Result<Application, GatewayError>;
}

/// Failure reported by the gateway. `Clone` so one in-flight fetch result
/// can be handed to every reader that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("record not found")]
    NotFound,
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}
