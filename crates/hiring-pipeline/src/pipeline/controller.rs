use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::domain::{
    ApplicantId, Application, ApplicationKey, Interview, Requirement, RequirementDraft,
    RequirementEdit, RequirementId, RequirementPayload, TransitionExtra,
};
use super::error::{NotFound, PipelineError};
use super::gateway::{GatewayError, JobGateway};
use super::status::{
    validate_application_transition, validate_requirement_transition, ApplicationStatus,
    RequirementStatus,
};
use super::store::{Invalidation, PipelineStore};

/// Employer intent on a single application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApplicationAction {
    Shortlist,
    /// Schedules, or reschedules when the application is already interviewing.
    ScheduleInterview {
        interview: Interview,
    },
    Select,
    Reject,
    MarkJoined,
    MarkNoShow,
}

impl ApplicationAction {
    pub fn into_request(self) -> (ApplicationStatus, TransitionExtra) {
        match self {
            Self::Shortlist => (ApplicationStatus::UnderReview, TransitionExtra::default()),
            Self::ScheduleInterview { interview } => (
                ApplicationStatus::Interviewing,
                TransitionExtra::interview(interview),
            ),
            Self::Select => (ApplicationStatus::Selected, TransitionExtra::default()),
            Self::Reject => (ApplicationStatus::Rejected, TransitionExtra::default()),
            Self::MarkJoined => (ApplicationStatus::Joined, TransitionExtra::default()),
            Self::MarkNoShow => (ApplicationStatus::NoShow, TransitionExtra::default()),
        }
    }
}

/// Employer intent on a requirement's posting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RequirementAction {
    Publish,
    Close,
    /// Reopens an expired posting. Applications are kept.
    Renew {
        #[serde(default)]
        deadline: Option<DateTime<Utc>>,
    },
}

impl RequirementAction {
    pub const fn target(&self) -> RequirementStatus {
        match self {
            Self::Publish | Self::Renew { .. } => RequirementStatus::Active,
            Self::Close => RequirementStatus::Expired,
        }
    }

    fn deadline(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Renew { deadline } => *deadline,
            Self::Publish | Self::Close => None,
        }
    }
}

/// The only writer of pipeline state. Every mutation runs
/// validate, optimistic apply, gateway call, then commit or rollback.
///
/// Failures are returned to the caller and never retried here.
pub struct TransitionController<G> {
    store: PipelineStore<G>,
    gateway: Arc<G>,
}

impl<G> Clone for TransitionController<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<G: JobGateway> TransitionController<G> {
    pub fn new(store: PipelineStore<G>) -> Self {
        let gateway = store.gateway();
        Self { store, gateway }
    }

    pub fn store(&self) -> &PipelineStore<G> {
        &self.store
    }

    pub async fn request_application_transition(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
        target: ApplicationStatus,
        extra: TransitionExtra,
    ) -> Result<Application, PipelineError> {
        self.store.get(requirement_id).await?;

        let key = ApplicationKey::new(requirement_id, applicant_id);
        let with_interview = target == ApplicationStatus::Interviewing && extra.interview.is_some();
        let extra = if with_interview {
            extra
        } else {
            TransitionExtra::default()
        };

        let token = self.store.apply_optimistic(&key, |_, current| {
            let current = current.ok_or_else(|| NotFound::Application(key.clone()))?;
            let transition = validate_application_transition(current.status, target, with_interview)?;
            let mut next = current.clone();
            next.status = target;
            if transition.attaches_interview() {
                next.interview = extra.interview.clone();
            }
            Ok(next)
        })?;
        debug!(application = %key, to = %target, "application transition applied optimistically");

        let gateway = Arc::clone(&self.gateway);
        let store = self.store.clone();
        settle(tokio::spawn(async move {
            let result = gateway
                .set_application_status(&key.requirement_id, &key.applicant_id, target, &extra)
                .await;
            match result {
                Ok(confirmed) => {
                    store.commit_application(token, confirmed.clone());
                    info!(application = %key, status = %confirmed.status, "application transition committed");
                    Ok(confirmed)
                }
                Err(cause) => {
                    store.rollback(token);
                    warn!(application = %key, error = %cause, "application transition rolled back");
                    Err(PipelineError::TransitionFailed(cause))
                }
            }
        }))
        .await
    }

    pub async fn apply_action(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
        action: ApplicationAction,
    ) -> Result<Application, PipelineError> {
        let (target, extra) = action.into_request();
        self.request_application_transition(requirement_id, applicant_id, target, extra)
            .await
    }

    /// A worker applies; the application starts in `Applied`.
    pub async fn submit_application(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
    ) -> Result<Application, PipelineError> {
        self.store.get(requirement_id).await?;

        let key = ApplicationKey::new(requirement_id, applicant_id);
        let now = Utc::now();
        let token = self.store.apply_optimistic(&key, |requirement, existing| {
            if existing.is_some() {
                return Err(PipelineError::AlreadyApplied {
                    requirement_id: key.requirement_id.clone(),
                    applicant_id: key.applicant_id.clone(),
                });
            }
            let status = requirement.effective_status(now);
            if status != RequirementStatus::Active {
                return Err(PipelineError::NotAcceptingApplications {
                    requirement_id: key.requirement_id.clone(),
                    status,
                });
            }
            Ok(Application {
                requirement_id: key.requirement_id.clone(),
                applicant_id: key.applicant_id.clone(),
                status: ApplicationStatus::Applied,
                applied_at: now,
                interview: None,
            })
        })?;
        debug!(application = %key, "application submitted optimistically");

        let gateway = Arc::clone(&self.gateway);
        let store = self.store.clone();
        settle(tokio::spawn(async move {
            match gateway
                .submit_application(&key.requirement_id, &key.applicant_id)
                .await
            {
                Ok(confirmed) => {
                    store.commit_application(token, confirmed.clone());
                    info!(application = %key, "application submitted");
                    Ok(confirmed)
                }
                Err(cause) => {
                    store.rollback(token);
                    warn!(application = %key, error = %cause, "application submission rolled back");
                    Err(PipelineError::TransitionFailed(cause))
                }
            }
        }))
        .await
    }

    /// Publish, close or renew. Owner lists are invalidated on success since
    /// the requirement may have moved between them.
    pub async fn request_requirement_transition(
        &self,
        requirement_id: &RequirementId,
        action: RequirementAction,
    ) -> Result<Requirement, PipelineError> {
        self.store.get(requirement_id).await?;

        let target = action.target();
        let deadline = action.deadline();
        let now = Utc::now();
        let token = self
            .store
            .apply_requirement_optimistic(requirement_id, |requirement| {
                validate_requirement_transition(requirement.effective_status(now), target)?;
                requirement.status = target;
                if deadline.is_some() {
                    requirement.deadline = deadline;
                }
                Ok(())
            })?;
        debug!(requirement = %requirement_id, to = %target, "requirement transition applied optimistically");

        let id = requirement_id.clone();
        let gateway = Arc::clone(&self.gateway);
        let store = self.store.clone();
        settle(tokio::spawn(async move {
            match gateway.set_requirement_status(&id, target, deadline).await {
                Ok(confirmed) => {
                    let owner_id = confirmed.owner_id.clone();
                    store.commit_requirement(token, confirmed.clone());
                    store.invalidate(Invalidation::Owner(owner_id));
                    info!(requirement = %id, status = %confirmed.status, "requirement transition committed");
                    Ok(confirmed)
                }
                Err(cause) => {
                    store.rollback(token);
                    warn!(requirement = %id, error = %cause, "requirement transition rolled back");
                    Err(PipelineError::TransitionFailed(cause))
                }
            }
        }))
        .await
    }

    /// Creates as `Draft`, or `Active` when the draft asks to publish.
    pub async fn create_requirement(
        &self,
        draft: RequirementDraft,
    ) -> Result<Requirement, PipelineError> {
        let owner_id = draft.owner_id.clone();
        let payload = RequirementPayload::create(draft);

        let gateway = Arc::clone(&self.gateway);
        let store = self.store.clone();
        settle(tokio::spawn(async move {
            match gateway.create_or_update_requirement(payload).await {
                Ok(created) => {
                    store.insert_confirmed(created.clone());
                    store.invalidate(Invalidation::Owner(owner_id));
                    info!(requirement = %created.id, status = %created.status, "requirement created");
                    Ok(created)
                }
                Err(cause) => {
                    warn!(owner = %owner_id, error = %cause, "requirement creation failed");
                    Err(PipelineError::TransitionFailed(cause))
                }
            }
        }))
        .await
    }

    /// Edits title, capacity and deadline. Status and owner are sent as cached.
    pub async fn update_requirement(
        &self,
        requirement_id: &RequirementId,
        edit: RequirementEdit,
    ) -> Result<Requirement, PipelineError> {
        self.store.get(requirement_id).await?;

        let token = self
            .store
            .apply_requirement_optimistic(requirement_id, |requirement| {
                requirement.title = edit.title.clone();
                requirement.capacity = edit.capacity;
                requirement.deadline = edit.deadline;
                Ok(())
            })?;
        let Some(current) = self.store.peek(requirement_id) else {
            self.store.rollback(token);
            return Err(NotFound::Requirement(requirement_id.clone()).into());
        };
        let payload = RequirementPayload::update(&current, edit);

        let id = requirement_id.clone();
        let gateway = Arc::clone(&self.gateway);
        let store = self.store.clone();
        settle(tokio::spawn(async move {
            match gateway.create_or_update_requirement(payload).await {
                Ok(confirmed) => {
                    let owner_id = confirmed.owner_id.clone();
                    store.commit_requirement(token, confirmed.clone());
                    store.invalidate(Invalidation::Owner(owner_id));
                    info!(requirement = %id, "requirement updated");
                    Ok(confirmed)
                }
                Err(cause) => {
                    store.rollback(token);
                    warn!(requirement = %id, error = %cause, "requirement update rolled back");
                    Err(PipelineError::TransitionFailed(cause))
                }
            }
        }))
        .await
    }

    /// Allowed from any status. The requirement leaves the cache at once and
    /// is put back whole if the gateway refuses.
    pub async fn delete_requirement(&self, requirement_id: &RequirementId) -> Result<(), PipelineError> {
        let owner_id = self.store.get(requirement_id).await?.owner_id;
        let token = self.store.remove_optimistic(requirement_id)?;
        debug!(requirement = %requirement_id, "requirement removed optimistically");

        let id = requirement_id.clone();
        let gateway = Arc::clone(&self.gateway);
        let store = self.store.clone();
        settle(tokio::spawn(async move {
            match gateway.delete_requirement(&id).await {
                // Already gone upstream; nothing to put back.
                Ok(()) | Err(GatewayError::NotFound) => {
                    store.commit(token);
                    store.invalidate(Invalidation::Owner(owner_id));
                    info!(requirement = %id, "requirement deleted");
                    Ok(())
                }
                Err(cause) => {
                    store.rollback(token);
                    warn!(requirement = %id, error = %cause, "requirement deletion rolled back");
                    Err(PipelineError::TransitionFailed(cause))
                }
            }
        }))
        .await
    }
}

// Gateway work runs on its own task: a caller that stops waiting does not
// cancel the commit or rollback.
async fn settle<T>(handle: JoinHandle<Result<T, PipelineError>>) -> Result<T, PipelineError> {
    handle.await.unwrap_or_else(|err| {
        Err(PipelineError::TransitionFailed(GatewayError::Unavailable(
            format!("transition task did not complete: {err}"),
        )))
    })
}
