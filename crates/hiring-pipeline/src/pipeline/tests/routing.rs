use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::pipeline::gateway::GatewayError;
use crate::pipeline::router::{self, ApplicationTransitionRequest};
use crate::pipeline::status::{ApplicationStatus, RequirementStatus};
use crate::pipeline::{pipeline_router, TransitionController};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn router_for(controller: TransitionController<FakeGateway>) -> axum::Router {
    pipeline_router(Arc::new(controller))
}

#[tokio::test]
async fn transition_handler_returns_unprocessable_for_illegal_edge() {
    let (_, _, controller) = harness(vec![posting(&[("W1", ApplicationStatus::Applied)])]);

    let response = router::application_transition_handler::<FakeGateway>(
        State(Arc::new(controller)),
        Path(("R1".to_string(), "W1".to_string())),
        Json(ApplicationTransitionRequest {
            target: ApplicationStatus::Joined,
            interview: None,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "application cannot move from Applied to Joined");
}

#[tokio::test]
async fn transition_route_schedules_interview() {
    let (_, _, controller) = harness(vec![posting(&[("W2", ApplicationStatus::UnderReview)])]);
    let interview = serde_json::to_value(interview_at(10, 10)).expect("serialize");

    let response = router_for(controller)
        .oneshot(json_request(
            "POST",
            "/api/v1/requirements/R1/applications/W2/transitions",
            json!({ "target": "INTERVIEWING", "interview": interview }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "INTERVIEWING");
    assert_eq!(body["interview"]["time"], "2025-12-10T10:00:00Z");
    assert_eq!(body["interview"]["type"], "in_person");
}

#[tokio::test]
async fn gateway_failure_maps_to_bad_gateway() {
    let (gateway, store, controller) = harness(vec![posting(&[("W1", ApplicationStatus::Applied)])]);
    store.get(&rid("R1")).await.expect("loads");
    gateway.fail_next(GatewayError::Unavailable("offline".to_string()));

    let response = router_for(controller)
        .oneshot(json_request(
            "POST",
            "/api/v1/requirements/R1/applications/W1/transitions",
            json!({ "target": "UNDER_REVIEW" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn missing_requirement_maps_to_not_found() {
    let (_, _, controller) = harness(Vec::new());

    let response = router_for(controller)
        .oneshot(get_request("/api/v1/requirements/R404"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn in_flight_write_maps_to_conflict() {
    let (gateway, store, controller) = harness(vec![posting(&[("W1", ApplicationStatus::Applied)])]);
    store.get(&rid("R1")).await.expect("loads");
    gateway.hold();
    let router = router_for(controller);

    let first = {
        let router = router.clone();
        tokio::spawn(async move {
            router
                .oneshot(json_request(
                    "POST",
                    "/api/v1/requirements/R1/applications/W1/transitions",
                    json!({ "target": "UNDER_REVIEW" }),
                ))
                .await
        })
    };
    settle_until(|| gateway.mutation_count() == 1).await;

    let second = router
        .oneshot(json_request(
            "POST",
            "/api/v1/requirements/R1/applications/W1/transitions",
            json!({ "target": "REJECTED" }),
        ))
        .await
        .expect("response");
    assert_eq!(second.status(), StatusCode::CONFLICT);

    gateway.release();
    let first = first.await.expect("task").expect("response");
    assert_eq!(first.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_then_publish_then_apply() {
    let (_, _, controller) = harness(Vec::new());
    let router = router_for(controller);

    let created = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/requirements",
            json!({ "owner_id": "E1", "title": "Loader", "capacity": 2 }),
        ))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json_body(created).await;
    assert_eq!(body["status"], "DRAFT");
    let id = body["id"].as_str().expect("id").to_string();

    let published = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/requirements/{id}/transitions"),
            json!({ "action": "publish" }),
        ))
        .await
        .expect("response");
    assert_eq!(published.status(), StatusCode::OK);

    let applied = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/requirements/{id}/applications"),
            json!({ "applicant_id": "W9" }),
        ))
        .await
        .expect("response");
    assert_eq!(applied.status(), StatusCode::CREATED);

    let again = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/requirements/{id}/applications"),
            json!({ "applicant_id": "W9" }),
        ))
        .await
        .expect("response");
    assert_eq!(again.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn requirement_detail_includes_pipeline_board() {
    let (_, _, controller) = harness(vec![posting(&[
        ("W1", ApplicationStatus::Applied),
        ("W2", ApplicationStatus::Selected),
    ])]);

    let response = router_for(controller)
        .oneshot(get_request("/api/v1/requirements/R1"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["requirement"]["status"], "ACTIVE");
    assert_eq!(body["applicants"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["pipeline"][2]["column"], "hired");
    assert_eq!(body["pipeline"][2]["applicants"][0]["applicant_id"], "W2");
}

#[tokio::test]
async fn dashboards_are_served_per_owner_and_worker() {
    let (_, _, controller) = harness(vec![
        posting(&[("W1", ApplicationStatus::Interviewing)]),
        requirement("R2", "E2", RequirementStatus::Draft),
    ]);
    let router = router_for(controller);

    let owner_view = router
        .clone()
        .oneshot(get_request("/api/v1/owners/E1/dashboard"))
        .await
        .expect("response");
    assert_eq!(owner_view.status(), StatusCode::OK);
    let body = read_json_body(owner_view).await;
    assert_eq!(body["owner_id"], "E1");
    assert_eq!(body["total_applications"], 1);

    let listing = router
        .clone()
        .oneshot(get_request("/api/v1/owners/E2/requirements"))
        .await
        .expect("response");
    let body = read_json_body(listing).await;
    assert_eq!(body[0]["status"], "DRAFT");

    let worker_view = router
        .oneshot(get_request("/api/v1/workers/W1/dashboard"))
        .await
        .expect("response");
    let body = read_json_body(worker_view).await;
    assert_eq!(body["columns"][1]["count"], 1);
    assert_eq!(body["assignments"][0]["requirement_id"], "R1");
}

#[tokio::test]
async fn delete_route_returns_no_content() {
    let (gateway, _, controller) = harness(vec![posting(&[])]);

    let response = router_for(controller)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/requirements/R1")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(gateway.server_copy(&rid("R1")).is_none());
}
