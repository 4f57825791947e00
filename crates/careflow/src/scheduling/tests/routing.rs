use super::common::*;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::scheduling::domain::{CancelVisitRequest, CancellationReason, ConflictQuery};
use crate::scheduling::router;
use crate::scheduling::service::VisitScheduler;

#[tokio::test]
async fn create_handler_returns_conflict_with_details() {
    let (scheduler, _, _) = build_scheduler();
    let caregiver = caregiver_id("a");
    scheduler
        .create_visit(new_visit(
            Some(caregiver.clone()),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("first booking succeeds");
    let scheduler = Arc::new(scheduler);

    let response = router::create_visit_handler::<MemoryRepository, MemoryDirectory, StaticVerifier>(
        State(scheduler),
        axum::Json(new_visit(
            Some(caregiver),
            utc(2026, 1, 5, 10, 0),
            utc(2026, 1, 5, 12, 0),
        )),
    )
    .await;

    assert_conflict_response(&response);
    let body = read_json_body(response).await;
    assert_eq!(
        body["conflicts"].as_array().map(Vec::len),
        Some(1),
        "conflict details are included"
    );
}

#[tokio::test]
async fn clock_in_handler_rejects_wrong_caregiver() {
    let (scheduler, _, _) = build_scheduler();
    let visit = scheduler
        .create_visit(new_visit(
            Some(caregiver_id("a")),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("create succeeds");
    let scheduler = Arc::new(scheduler);

    let response = router::clock_in_handler::<MemoryRepository, MemoryDirectory, StaticVerifier>(
        State(scheduler),
        Path(visit.id.0),
        axum::Json(clock_in_request(&caregiver_id("b"), utc(2026, 1, 5, 9, 2))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn clock_in_handler_returns_unprocessable_outside_service_area() {
    let (scheduler, _) = build_scheduler_with_verifier(false);
    let caregiver = caregiver_id("a");
    let visit = scheduler
        .create_visit(new_visit(
            Some(caregiver.clone()),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("create succeeds");
    let scheduler = Arc::new(scheduler);

    let response = router::clock_in_handler::<MemoryRepository, MemoryDirectory, StaticVerifier>(
        State(scheduler),
        Path(visit.id.0),
        axum::Json(clock_in_request(&caregiver, utc(2026, 1, 5, 9, 2))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_handler_returns_internal_error_on_repository_failure() {
    let scheduler = Arc::new(VisitScheduler::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryDirectory::with_client(client_profile())),
        Arc::new(StaticVerifier { allow: true }),
        Arc::new(FixedDistance(8.0)),
    ));

    let response =
        router::create_visit_handler::<UnavailableRepository, MemoryDirectory, StaticVerifier>(
            State(scheduler),
            axum::Json(new_visit(
                Some(caregiver_id("a")),
                utc(2026, 1, 5, 9, 0),
                utc(2026, 1, 5, 11, 0),
            )),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn create_route_accepts_payloads() {
    let (scheduler, _, _) = build_scheduler();
    let app = scheduler_router(scheduler);

    let response = app
        .oneshot(
            axum::http::Request::post("/api/v1/visits")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&new_visit(
                        Some(caregiver_id("a")),
                        utc(2026, 1, 5, 9, 0),
                        utc(2026, 1, 5, 11, 0),
                    ))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = read_json_body(response).await;
    assert_eq!(body["status"], "ASSIGNED");
    assert!(body["id"].as_str().unwrap().starts_with("visit-"));
}

#[tokio::test]
async fn update_route_returns_not_found_for_unknown_visit() {
    let (scheduler, _, _) = build_scheduler();
    let app = scheduler_router(scheduler);

    let response = app
        .oneshot(
            axum::http::Request::patch("/api/v1/visits/visit-999999")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conflicts_route_rejects_inverted_intervals() {
    let (scheduler, _, _) = build_scheduler();
    let app = scheduler_router(scheduler);

    let query = ConflictQuery {
        caregiver_id: Some(caregiver_id("a")),
        scheduled_start: utc(2026, 1, 5, 11, 0),
        scheduled_end: utc(2026, 1, 5, 9, 0),
        exclude_visit_id: None,
    };
    let response = app
        .oneshot(
            axum::http::Request::post("/api/v1/visits/conflicts")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(serde_json::to_vec(&query).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_route_reports_the_outcome() {
    let (scheduler, _, _) = build_scheduler();
    let visit = scheduler
        .create_visit(new_visit(
            Some(caregiver_id("a")),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("create succeeds");
    let app = scheduler_router(scheduler);

    let request = CancelVisitRequest {
        reason: CancellationReason::ClientRequest,
        notes: Some("family visit".to_string()),
        reschedule: None,
    };
    let response = app
        .oneshot(
            axum::http::Request::post(format!("/api/v1/visits/{}/cancel", visit.id.0))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&request).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["cancelled"]["status"], "CANCELLED");
    assert!(body["replacement"].is_null());
}

#[tokio::test]
async fn no_show_route_updates_the_status() {
    let (scheduler, _, _) = build_scheduler();
    let visit = scheduler
        .create_visit(new_visit(
            Some(caregiver_id("a")),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("create succeeds");
    let app = scheduler_router(scheduler);

    let response = app
        .oneshot(
            axum::http::Request::post(format!("/api/v1/visits/{}/no-show", visit.id.0))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    json!({ "party": "CAREGIVER" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "NO_SHOW_CAREGIVER");
}

#[tokio::test]
async fn task_route_applies_updates() {
    let (scheduler, _, _) = build_scheduler();
    let caregiver = caregiver_id("a");
    let visit = scheduler
        .create_visit(new_visit(
            Some(caregiver.clone()),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("create succeeds");
    let app = scheduler_router(scheduler);

    let payload = json!({
        "acting_caregiver": caregiver.0,
        "tasks": [{ "index": 0, "completed": true, "notes": "done early" }],
    });
    let response = app
        .oneshot(
            axum::http::Request::put(format!("/api/v1/visits/{}/tasks", visit.id.0))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["tasks"][0]["completed"], true);
    assert_eq!(body["tasks"][0]["notes"], "done early");
}

#[tokio::test]
async fn clock_flow_over_routes_completes_the_visit() {
    let (scheduler, _, _) = build_scheduler();
    let caregiver = caregiver_id("a");
    let visit = scheduler
        .create_visit(new_visit(
            Some(caregiver.clone()),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("create succeeds");
    let app = scheduler_router(scheduler);

    let response = app
        .clone()
        .oneshot(
            axum::http::Request::post(format!("/api/v1/visits/{}/clock-in", visit.id.0))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&clock_in_request(&caregiver, utc(2026, 1, 5, 9, 0)))
                        .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            axum::http::Request::post(format!("/api/v1/visits/{}/clock-out", visit.id.0))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&clock_out_request(&caregiver, utc(2026, 1, 5, 11, 30)))
                        .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["billable_hours"], 2.5);
    assert_eq!(body["event"]["kind"], "CLOCK_OUT");
}

#[tokio::test]
async fn matches_route_ranks_the_pool() {
    let (scheduler, _, directory) = build_scheduler();
    directory.set_pool(vec![snapshot("a"), snapshot("b")]);
    let app = scheduler_router(scheduler);

    let response = app
        .oneshot(
            axum::http::Request::post("/api/v1/caregivers/matches")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&match_request()).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let results = body.as_array().expect("array of matches");
    assert_eq!(results.len(), 2);
    assert!(results[0]["match_score"].as_u64().unwrap() <= 100);
}

#[tokio::test]
async fn stats_route_aggregates_the_book() {
    let (scheduler, _, _) = build_scheduler();
    scheduler
        .create_visit(new_visit(
            Some(caregiver_id("a")),
            utc(2026, 1, 5, 9, 0),
            utc(2026, 1, 5, 11, 0),
        ))
        .expect("create succeeds");
    let app = scheduler_router(scheduler);

    let response = app
        .oneshot(
            axum::http::Request::post("/api/v1/visits/stats")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total_visits"], 1);
    assert_eq!(body["completed_visits"], 0);
}

#[tokio::test]
async fn bulk_route_returns_created_count() {
    let (scheduler, _, _) = build_scheduler();
    let app = scheduler_router(scheduler);

    let payload = json!({
        "client_id": "client-001",
        "caregiver_id": "caregiver-a",
        "period": { "start_date": "2026-01-05", "end_date": "2026-01-09" },
        "days_of_week": ["MONDAY", "WEDNESDAY", "FRIDAY"],
        "start_time": "09:00:00",
        "end_time": "11:00:00",
        "visit_type": "REGULAR_CARE",
    });
    let response = app
        .oneshot(
            axum::http::Request::post("/api/v1/visits/bulk")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["created_count"], 3);
}
