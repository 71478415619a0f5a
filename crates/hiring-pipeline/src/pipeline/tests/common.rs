use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::pipeline::domain::{
    ApplicantId, Application, ApplicationKey, Interview, InterviewKind, OwnerId, Requirement,
    RequirementId, RequirementPayload, TransitionExtra,
};
use crate::pipeline::gateway::{GatewayError, JobGateway};
use crate::pipeline::status::{ApplicationStatus, RequirementStatus};
use crate::pipeline::store::{PipelineStore, StoreConfig};
use crate::pipeline::TransitionController;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Call {
    FetchRequirement(RequirementId),
    FetchByOwner(OwnerId),
    FetchAll,
    CreateOrUpdate(RequirementPayload),
    SetRequirementStatus(RequirementId, RequirementStatus),
    Delete(RequirementId),
    Submit(ApplicationKey),
    SetApplicationStatus(ApplicationKey, ApplicationStatus),
}

impl Call {
    pub(super) fn is_fetch(&self) -> bool {
        matches!(
            self,
            Call::FetchRequirement(_) | Call::FetchByOwner(_) | Call::FetchAll
        )
    }
}

#[derive(Default)]
struct FakeState {
    requirements: BTreeMap<RequirementId, Requirement>,
    calls: Vec<Call>,
    fail_next: Option<GatewayError>,
    next_id: u32,
}

type Gate = Mutex<Option<Arc<Semaphore>>>;

/// In-memory gateway that records every call. Mutations can be held at a
/// gate so tests can observe the optimistic window. Fetches have their own
/// gate, passed after the server data is read.
#[derive(Default)]
pub(super) struct FakeGateway {
    state: Mutex<FakeState>,
    gate: Gate,
    fetch_gate: Gate,
}

impl FakeGateway {
    pub(super) fn with(requirements: Vec<Requirement>) -> Self {
        let gateway = Self::default();
        {
            let mut state = gateway.state.lock();
            for requirement in requirements {
                state.requirements.insert(requirement.id.clone(), requirement);
            }
        }
        gateway
    }

    pub(super) fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub(super) fn fetch_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|call| call.is_fetch()).count()
    }

    pub(super) fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| !call.is_fetch())
            .count()
    }

    /// The next gateway call fails with `error`.
    pub(super) fn fail_next(&self, error: GatewayError) {
        self.state.lock().fail_next = Some(error);
    }

    /// Edits server-side state without going through the pipeline.
    pub(super) fn edit_server<F: FnOnce(&mut BTreeMap<RequirementId, Requirement>)>(&self, edit: F) {
        edit(&mut self.state.lock().requirements);
    }

    pub(super) fn server_copy(&self, id: &RequirementId) -> Option<Requirement> {
        self.state.lock().requirements.get(id).cloned()
    }

    /// Mutating calls wait until [`FakeGateway::release`].
    pub(super) fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub(super) fn release(&self) {
        open_gate(&self.gate);
    }

    /// Fetches read the server data, then wait until
    /// [`FakeGateway::release_fetches`].
    pub(super) fn hold_fetches(&self) {
        *self.fetch_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub(super) fn release_fetches(&self) {
        open_gate(&self.fetch_gate);
    }

    fn record(&self, call: Call) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn pass_gate(&self) {
        wait_at(&self.gate).await;
    }
}

fn open_gate(gate: &Gate) {
    if let Some(gate) = gate.lock().take() {
        gate.add_permits(64);
    }
}

async fn wait_at(gate: &Gate) {
    let gate = gate.lock().clone();
    if let Some(gate) = gate {
        let _permit = gate.acquire().await.expect("gate open");
    }
}

#[async_trait]
impl JobGateway for FakeGateway {
    async fn fetch_requirement(&self, id: &RequirementId) -> Result<Requirement, GatewayError> {
        self.record(Call::FetchRequirement(id.clone()))?;
        let found = self.state.lock().requirements.get(id).cloned();
        wait_at(&self.fetch_gate).await;
        found.ok_or(GatewayError::NotFound)
    }

    async fn fetch_requirements_by_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Vec<Requirement>, GatewayError> {
        self.record(Call::FetchByOwner(owner_id.clone()))?;
        let owned: Vec<Requirement> = self
            .state
            .lock()
            .requirements
            .values()
            .filter(|requirement| &requirement.owner_id == owner_id)
            .cloned()
            .collect();
        wait_at(&self.fetch_gate).await;
        Ok(owned)
    }

    async fn fetch_all_requirements(&self) -> Result<Vec<Requirement>, GatewayError> {
        self.record(Call::FetchAll)?;
        let all: Vec<Requirement> = self.state.lock().requirements.values().cloned().collect();
        wait_at(&self.fetch_gate).await;
        Ok(all)
    }

    async fn create_or_update_requirement(
        &self,
        payload: RequirementPayload,
    ) -> Result<Requirement, GatewayError> {
        self.record(Call::CreateOrUpdate(payload.clone()))?;
        self.pass_gate().await;
        let mut state = self.state.lock();
        let id = match payload.id {
            Some(id) => id,
            None => {
                state.next_id += 1;
                RequirementId(format!("R{}", state.next_id))
            }
        };
        let applications = state
            .requirements
            .get(&id)
            .map(|existing| existing.applications.clone())
            .unwrap_or_default();
        let requirement = Requirement {
            id: id.clone(),
            owner_id: payload.owner_id,
            title: payload.title,
            status: payload.status,
            capacity: payload.capacity,
            deadline: payload.deadline,
            applications,
        };
        state.requirements.insert(id, requirement.clone());
        Ok(requirement)
    }

    async fn set_requirement_status(
        &self,
        id: &RequirementId,
        status: RequirementStatus,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Requirement, GatewayError> {
        self.record(Call::SetRequirementStatus(id.clone(), status))?;
        self.pass_gate().await;
        let mut state = self.state.lock();
        let requirement = state
            .requirements
            .get_mut(id)
            .ok_or(GatewayError::NotFound)?;
        requirement.status = status;
        if deadline.is_some() {
            requirement.deadline = deadline;
        }
        Ok(requirement.clone())
    }

    async fn delete_requirement(&self, id: &RequirementId) -> Result<(), GatewayError> {
        self.record(Call::Delete(id.clone()))?;
        self.pass_gate().await;
        self.state
            .lock()
            .requirements
            .remove(id)
            .map(|_| ())
            .ok_or(GatewayError::NotFound)
    }

    async fn submit_application(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
    ) -> Result<Application, GatewayError> {
        self.record(Call::Submit(ApplicationKey::new(requirement_id, applicant_id)))?;
        self.pass_gate().await;
        let mut state = self.state.lock();
        let requirement = state
            .requirements
            .get_mut(requirement_id)
            .ok_or(GatewayError::NotFound)?;
        if requirement.application(applicant_id).is_some() {
            return Err(GatewayError::Rejected("duplicate application".to_string()));
        }
        let created = application(requirement_id, applicant_id, ApplicationStatus::Applied);
        requirement.applications.push(created.clone());
        Ok(created)
    }

    async fn set_application_status(
        &self,
        requirement_id: &RequirementId,
        applicant_id: &ApplicantId,
        status: ApplicationStatus,
        extra: &TransitionExtra,
    ) -> Result<Application, GatewayError> {
        self.record(Call::SetApplicationStatus(
            ApplicationKey::new(requirement_id, applicant_id),
            status,
        ))?;
        self.pass_gate().await;
        let mut state = self.state.lock();
        let application = state
            .requirements
            .get_mut(requirement_id)
            .and_then(|requirement| requirement.application_mut(applicant_id))
            .ok_or(GatewayError::NotFound)?;
        application.status = status;
        if extra.interview.is_some() {
            application.interview = extra.interview.clone();
        }
        Ok(application.clone())
    }
}

pub(super) type Harness = (
    Arc<FakeGateway>,
    PipelineStore<FakeGateway>,
    TransitionController<FakeGateway>,
);

pub(super) fn harness(requirements: Vec<Requirement>) -> Harness {
    harness_with(requirements, StoreConfig::default())
}

pub(super) fn harness_with(requirements: Vec<Requirement>, config: StoreConfig) -> Harness {
    let gateway = Arc::new(FakeGateway::with(requirements));
    let store = PipelineStore::new(Arc::clone(&gateway), config);
    let controller = TransitionController::new(store.clone());
    (gateway, store, controller)
}

pub(super) fn rid(value: &str) -> RequirementId {
    RequirementId(value.to_string())
}

pub(super) fn owner(value: &str) -> OwnerId {
    OwnerId(value.to_string())
}

pub(super) fn worker(value: &str) -> ApplicantId {
    ApplicantId(value.to_string())
}

pub(super) fn applied_on() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 20, 8, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn requirement(id: &str, owner_id: &str, status: RequirementStatus) -> Requirement {
    Requirement {
        id: rid(id),
        owner_id: owner(owner_id),
        title: format!("Picker {id}"),
        status,
        capacity: NonZeroU32::new(2).expect("non-zero"),
        deadline: Some(Utc::now() + Duration::days(30)),
        applications: Vec::new(),
    }
}

pub(super) fn application(
    requirement_id: &RequirementId,
    applicant_id: &ApplicantId,
    status: ApplicationStatus,
) -> Application {
    Application {
        requirement_id: requirement_id.clone(),
        applicant_id: applicant_id.clone(),
        status,
        applied_at: applied_on(),
        interview: None,
    }
}

/// Active `R1` owned by `E1` with the given applicants.
pub(super) fn posting(applicants: &[(&str, ApplicationStatus)]) -> Requirement {
    let mut posting = requirement("R1", "E1", RequirementStatus::Active);
    posting.applications = applicants
        .iter()
        .map(|(applicant, status)| application(&posting.id, &worker(applicant), *status))
        .collect();
    posting
}

pub(super) fn interview_at(day: u32, hour: u32) -> Interview {
    Interview {
        time: Utc
            .with_ymd_and_hms(2025, 12, day, hour, 0, 0)
            .single()
            .expect("valid timestamp"),
        duration_minutes: 45,
        kind: InterviewKind::InPerson,
        location: Some("Dock 4".to_string()),
        interviewer_name: "Morgan".to_string(),
        notes: None,
    }
}

/// Lets spawned tasks run until `condition` holds.
pub(super) async fn settle_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
