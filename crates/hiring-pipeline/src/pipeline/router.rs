use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::controller::{RequirementAction, TransitionController};
use super::domain::{
    ApplicantId, Interview, OwnerId, RequirementDraft, RequirementEdit, RequirementId,
    TransitionExtra,
};
use super::error::PipelineError;
use super::gateway::JobGateway;
use super::projections;
use super::status::ApplicationStatus;

type SharedController<G> = Arc<TransitionController<G>>;

#[derive(Debug, Deserialize)]
pub(crate) struct ApplicationTransitionRequest {
    pub(crate) target: ApplicationStatus,
    #[serde(default)]
    pub(crate) interview: Option<Interview>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitApplicationRequest {
    pub(crate) applicant_id: ApplicantId,
}

/// HTTP surface over the transition controller and the projections.
pub fn pipeline_router<G: JobGateway>(controller: SharedController<G>) -> Router {
    Router::new()
        .route("/api/v1/requirements", post(create_handler::<G>))
        .route(
            "/api/v1/requirements/:requirement_id",
            get(requirement_handler::<G>)
                .put(update_handler::<G>)
                .delete(delete_handler::<G>),
        )
        .route(
            "/api/v1/requirements/:requirement_id/transitions",
            post(requirement_transition_handler::<G>),
        )
        .route(
            "/api/v1/requirements/:requirement_id/applications",
            post(submit_application_handler::<G>),
        )
        .route(
            "/api/v1/requirements/:requirement_id/applications/:applicant_id/transitions",
            post(application_transition_handler::<G>),
        )
        .route(
            "/api/v1/owners/:owner_id/requirements",
            get(owner_requirements_handler::<G>),
        )
        .route(
            "/api/v1/owners/:owner_id/dashboard",
            get(owner_dashboard_handler::<G>),
        )
        .route(
            "/api/v1/workers/:applicant_id/dashboard",
            get(worker_dashboard_handler::<G>),
        )
        .with_state(controller)
}

pub(crate) fn error_response(error: PipelineError) -> Response {
    let status = match &error {
        PipelineError::IllegalTransition(_)
        | PipelineError::AlreadyApplied { .. }
        | PipelineError::NotAcceptingApplications { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::TransitionInProgress(_) => StatusCode::CONFLICT,
        PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::TransitionFailed(_) | PipelineError::FetchFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, PipelineError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn requirement_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(requirement_id): Path<String>,
) -> Response {
    let id = RequirementId(requirement_id);
    let result = controller.store().get(&id).await.map(|requirement| {
        json!({
            "requirement": projections::summarize(&requirement, Utc::now()),
            "applicants": projections::applicant_list(&requirement),
            "pipeline": projections::pipeline_board(&requirement),
        })
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn create_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Json(draft): Json<RequirementDraft>,
) -> Response {
    respond(StatusCode::CREATED, controller.create_requirement(draft).await)
}

pub(crate) async fn update_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(requirement_id): Path<String>,
    Json(edit): Json<RequirementEdit>,
) -> Response {
    let id = RequirementId(requirement_id);
    respond(StatusCode::OK, controller.update_requirement(&id, edit).await)
}

pub(crate) async fn delete_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(requirement_id): Path<String>,
) -> Response {
    let id = RequirementId(requirement_id);
    match controller.delete_requirement(&id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn requirement_transition_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(requirement_id): Path<String>,
    Json(action): Json<RequirementAction>,
) -> Response {
    let id = RequirementId(requirement_id);
    respond(
        StatusCode::OK,
        controller.request_requirement_transition(&id, action).await,
    )
}

pub(crate) async fn submit_application_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(requirement_id): Path<String>,
    Json(request): Json<SubmitApplicationRequest>,
) -> Response {
    let id = RequirementId(requirement_id);
    respond(
        StatusCode::CREATED,
        controller.submit_application(&id, &request.applicant_id).await,
    )
}

pub(crate) async fn application_transition_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path((requirement_id, applicant_id)): Path<(String, String)>,
    Json(request): Json<ApplicationTransitionRequest>,
) -> Response {
    let requirement_id = RequirementId(requirement_id);
    let applicant_id = ApplicantId(applicant_id);
    let extra = TransitionExtra {
        interview: request.interview,
    };
    respond(
        StatusCode::OK,
        controller
            .request_application_transition(&requirement_id, &applicant_id, request.target, extra)
            .await,
    )
}

pub(crate) async fn owner_requirements_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(owner_id): Path<String>,
) -> Response {
    let owner_id = OwnerId(owner_id);
    let now = Utc::now();
    let result = controller
        .store()
        .list_by_owner(&owner_id)
        .await
        .map(|requirements| {
            requirements
                .iter()
                .map(|requirement| projections::summarize(requirement, now))
                .collect::<Vec<_>>()
        });
    respond(StatusCode::OK, result)
}

pub(crate) async fn owner_dashboard_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(owner_id): Path<String>,
) -> Response {
    let owner_id = OwnerId(owner_id);
    let result = controller
        .store()
        .list_by_owner(&owner_id)
        .await
        .map(|requirements| projections::owner_dashboard(&owner_id, &requirements, Utc::now()));
    respond(StatusCode::OK, result)
}

pub(crate) async fn worker_dashboard_handler<G: JobGateway>(
    State(controller): State<SharedController<G>>,
    Path(applicant_id): Path<String>,
) -> Response {
    let applicant_id = ApplicantId(applicant_id);
    let result = controller
        .store()
        .list_all()
        .await
        .map(|requirements| projections::worker_dashboard(&applicant_id, &requirements));
    respond(StatusCode::OK, result)
}
