use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hiring_pipeline::pipeline::{
    ApplicantId, Application, ApplicationStatus, GatewayError, JobGateway, OwnerId, Requirement,
    RequirementId, RequirementPayload, RequirementStatus, TransitionExtra,
};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local stand-in for the remote job service.
#[derive(Default)]
pub(crate) struct InMemoryGateway {
    requirements: Mutex<BTreeMap<RequirementId, Requirement>>,
    sequence: AtomicU64,
}

impl InMemoryGateway {
    pub(crate) fn seeded(requirements: Vec<Requirement>) -> Self {
        let gateway = Self::default();
        {
            let mut guard = gateway.requirements.lock();
            for requirement in requirements {
                guard.insert(requirement.id.clone(), requirement);
            }
        }
        gateway
    }

    fn next_id(&self) -> RequirementId {
        let next = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        RequirementId(format!("req-{next:06}"))
    }
}

#[async_trait]
impl JobGateway for InMemoryGateway {
    async fn fetch_requirement(&self, id: &RequirementId) -> Result<Requirement, GatewayError> {
        self.requirements
            .lock()
            .get(id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn fetch_requirements_by_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Vec<Requirement>, GatewayError> {
        Ok(self
            .requirements
            .lock()
            .values()
            .filter(|requirement| &requirement.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn fetch_all_requirements(&self) -> Result<Vec<Requirement>, GatewayError> {
        Ok(self.requirements.lock().values().cloned().collect())
    }

    async fn create_or_update_requirement(
        &self,
        payload: RequirementPayload,
    ) -> Result<Requirement, GatewayError> {
        if payload.title.trim().is_empty() {
            return Err(GatewayError::Rejected("title must not be empty".to_string()));
        }

        let RequirementPayload {
            id,
            owner_id,
            title,
            status,
            capacity,
            deadline,
        } = payload;
        let (id, is_update) = match id {
            Some(id) => (id, true),
            None => (self.next_id(), false),
        };

        let mut guard = self.requirements.lock();
        let applications = match guard.get(&id) {
            Some(existing) if existing.owner_id != owner_id => {
                return Err(GatewayError::Rejected(
                    "requirement owner cannot change".to_string(),
                ))
            }
            Some(existing) => existing.applications.clone(),
            None if is_update => return Err(GatewayError::NotFound),
            None => Vec::new(),
        };
        let requirement = Requirement {
            id: id.clone(),
            owner_id,
            title: title.trim().to_string(),
            status,
            capacity,
            deadline,
            applications,
        };
        guard.insert(id, requirement.clone());
        Ok(requirement)
    }

    async fn set_requirement_status(
        &self,
        id: &RequirementId,
        status: RequirementStatus,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Requirement, GatewayError> {
        let mut guard = self.requirements.lock();
        let requirement = guard.get_mut(id).ok_or(GatewayError::NotFound)?;
        requirement.status = status;
        if deadline.is_some() {
            requirement.deadline = deadline;
        }
        Ok(requirement.clone())
    }

    async fn delete_requirement(&self, id: &RequirementId) -> Result<(), GatewayError> {
        self.requirements
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or(GatewayError::NotFound)
    }

    async fn submit_application(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
    ) -> Result<Application, GatewayError> {
        let mut guard = self.requirements.lock();
        let requirement = guard
            .get_mut(requirement_id)
            .ok_or(GatewayError::NotFound)?;
        if requirement.application(applicant_id).is_some() {
            return Err(GatewayError::Rejected(format!(
                "{applicant_id} already applied"
            )));
        }
        let application = Application {
            requirement_id: requirement_id.clone(),
            applicant_id: applicant_id.clone(),
            status: ApplicationStatus::Applied,
            applied_at: Utc::now(),
            interview: None,
        };
        requirement.applications.push(application.clone());
        Ok(application)
    }

    async fn set_application_status(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
        status: ApplicationStatus,
        extra: &TransitionExtra,
    ) -> Result<Application, GatewayError> {
        let mut guard = self.requirements.lock();
        let application = guard
            .get_mut(requirement_id)
            .and_then(|requirement| {
                requirement
                    .applications
                    .iter_mut()
                    .find(|application| &application.applicant_id == applicant_id)
            })
            .ok_or(GatewayError::NotFound)?;
        application.status = status;
        if let Some(interview) = &extra.interview {
            application.interview = Some(interview.clone());
        }
        Ok(application.clone())
    }
}

/// Sample postings for `serve --seed` and the demo.
pub(crate) fn sample_requirements(now: DateTime<Utc>) -> Vec<Requirement> {
    let posting = |id: &str, owner: &str, title: &str, status, deadline| Requirement {
        id: RequirementId(id.to_string()),
        owner_id: OwnerId(owner.to_string()),
        title: title.to_string(),
        status,
        capacity: NonZeroU32::MIN.saturating_add(2),
        deadline,
        applications: Vec::new(),
    };

    vec![
        posting(
            "seed-forklift",
            "employer-north",
            "Forklift operator",
            RequirementStatus::Active,
            Some(now + Duration::days(5)),
        ),
        posting(
            "seed-picker",
            "employer-north",
            "Night shift picker",
            RequirementStatus::Draft,
            None,
        ),
        posting(
            "seed-driver",
            "employer-south",
            "Delivery driver",
            RequirementStatus::Active,
            Some(now + Duration::days(21)),
        ),
    ]
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}
