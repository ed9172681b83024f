use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::recruitment::router::{
    allocate_handler, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER,
};
use crate::recruitment::{
    Actor, ApplicationStatus, FixedClock, InMemoryRecruitmentStore, MemoryAuditLog,
};

fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(ACTOR_ID_HEADER, actor.id.as_str())
            .header(ACTOR_ROLE_HEADER, actor.role.label());
    }
    match body {
        Some(body) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let h = harness();
    let response = h
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/v1/cycles/{}/allocate", h.cycle.id),
            None,
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_create_cycles() {
    let h = harness();
    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/cycles",
            Some(&student("kim")),
            Some(json!({ "year": 2027, "name": "2027 Recruitment" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn submit_route_creates_applications() {
    let h = harness();
    let submission = serde_json::to_value(h.submission(CHESS, 1)).unwrap();

    let response = h
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/applications",
            Some(&student("kim")),
            Some(submission),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "pending");
    assert_eq!(payload["club_id"], CHESS);
    assert!(payload.get("application_id").is_some());
}

#[tokio::test]
async fn unknown_applications_are_not_found() {
    let h = harness();
    let response = h
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/applications/app-missing",
            Some(&admin()),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn zero_rank_is_unprocessable() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);

    let response = h
        .router()
        .oneshot(request(
            "PUT",
            &format!("/api/v1/applications/{}/rank", application.id),
            Some(&chess_evaluator()),
            Some(json!({ "rank": 0, "note": "" })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn allocation_outside_review_conflicts() {
    let h = harness();
    let response = h
        .router()
        .oneshot(request(
            "POST",
            &format!("/api/v1/cycles/{}/allocate", h.cycle.id),
            Some(&admin()),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn review_and_allocation_over_http() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);
    h.start_review();

    let router = h.router();
    let rank = router
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/v1/applications/{}/rank", application.id),
            Some(&chess_evaluator()),
            Some(json!({ "rank": 1, "note": "sharp endgames" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(rank.status(), StatusCode::OK);

    let status = router
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/v1/applications/{}/status", application.id),
            Some(&chess_evaluator()),
            Some(json!({ "status": "accepted" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(status.status(), StatusCode::OK);

    let allocate = router
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/cycles/{}/allocate", h.cycle.id),
            Some(&admin()),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(allocate.status(), StatusCode::OK);
    let payload = read_json_body(allocate).await;
    assert_eq!(payload["allocated_count"], 1);
    assert_eq!(payload["rejected_count"], 0);
    assert_eq!(payload["strategy"], "deferred_acceptance");

    let view = router
        .oneshot(request(
            "GET",
            &format!("/api/v1/applications/{}", application.id),
            Some(&student("kim")),
            None,
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(view).await;
    assert_eq!(payload["status"], "allocated");
    assert_eq!(payload["rank"], 1);
    assert_eq!(h.status_of(&application.id), ApplicationStatus::Allocated);
}

#[tokio::test]
async fn cancel_route_returns_no_content() {
    let h = harness();
    let application = h.apply("kim", CHOIR, 1);

    let response = h
        .router()
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/applications/{}", application.id),
            Some(&student("kim")),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn allocate_handler_reports_unavailable_store() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);
    h.start_review();
    h.accept(&application.id, Some(1));
    h.store.fail_next_batches(10);

    let mut headers = HeaderMap::new();
    headers.insert(ACTOR_ID_HEADER, HeaderValue::from_static("admin-1"));
    headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_static("admin"));

    let response = allocate_handler::<InMemoryRecruitmentStore, MemoryAuditLog, FixedClock>(
        State(h.service.clone()),
        headers,
        Path(h.cycle.id.to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("unavailable"));
}

#[tokio::test]
async fn cycle_window_can_be_extended_over_http() {
    let h = harness();
    let extended = apply_end() + chrono::Duration::days(2);

    let response = h
        .router()
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/cycles/{}", h.cycle.id),
            Some(&admin()),
            Some(json!({ "apply_end": extended })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["apply_end"], json!(extended));
    assert_eq!(payload["max_applications"], 3);
}

#[tokio::test]
async fn evaluator_removal_returns_no_content() {
    let h = harness();
    let uri = format!(
        "/api/v1/cycles/{}/evaluators/{}/{}",
        h.cycle.id, CHESS, CHESS_EVALUATOR
    );

    let response = h
        .router()
        .oneshot(request("DELETE", &uri, Some(&admin()), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let again = h
        .router()
        .oneshot(request("DELETE", &uri, Some(&admin()), None))
        .await
        .expect("route executes");
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn round_deletion_is_admin_only() {
    let h = harness();
    let response = h
        .router()
        .oneshot(request(
            "DELETE",
            &format!("/api/v1/rounds/{}", h.round.id),
            Some(&chess_evaluator()),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn round_listing_reads_the_club_filter_from_the_query() {
    let h = harness();
    h.apply("kim", CHESS, 1);
    h.apply("lee", CHOIR, 1);

    let response = h
        .router()
        .oneshot(request(
            "GET",
            &format!("/api/v1/rounds/{}/applications?club_id={}", h.round.id, CHESS),
            Some(&chess_evaluator()),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let listing = payload.as_array().expect("array payload");
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["club_id"], CHESS);
}
