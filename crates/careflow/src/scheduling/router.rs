use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{patch, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    BulkScheduleRequest, CancelVisitRequest, CaregiverId, ClockInRequest, ClockOutRequest,
    ConflictQuery, MatchRequest, NewVisit, NoShowParty, TaskUpdate, VisitId, VisitStatsQuery,
    VisitUpdate,
};
use super::repository::{CareDirectory, LocationVerifier, VisitRepository};
use super::service::{SchedulingError, SchedulingErrorKind, VisitScheduler};

/// Router builder exposing the scheduling engine over HTTP/JSON.
pub fn scheduling_router<R, D, V>(scheduler: Arc<VisitScheduler<R, D, V>>) -> Router
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    Router::new()
        .route("/api/v1/visits", post(create_visit_handler::<R, D, V>))
        .route(
            "/api/v1/visits/conflicts",
            post(check_conflicts_handler::<R, D, V>),
        )
        .route(
            "/api/v1/visits/bulk",
            post(bulk_schedule_handler::<R, D, V>),
        )
        .route("/api/v1/visits/stats", post(visit_stats_handler::<R, D, V>))
        .route(
            "/api/v1/visits/:visit_id",
            patch(update_visit_handler::<R, D, V>),
        )
        .route(
            "/api/v1/visits/:visit_id/cancel",
            post(cancel_visit_handler::<R, D, V>),
        )
        .route(
            "/api/v1/visits/:visit_id/no-show",
            post(no_show_handler::<R, D, V>),
        )
        .route(
            "/api/v1/visits/:visit_id/clock-in",
            post(clock_in_handler::<R, D, V>),
        )
        .route(
            "/api/v1/visits/:visit_id/clock-out",
            post(clock_out_handler::<R, D, V>),
        )
        .route(
            "/api/v1/visits/:visit_id/tasks",
            put(update_tasks_handler::<R, D, V>),
        )
        .route(
            "/api/v1/caregivers/matches",
            post(rank_caregivers_handler::<R, D, V>),
        )
        .with_state(scheduler)
}

#[derive(Debug, Deserialize)]
pub(crate) struct NoShowRequest {
    pub(crate) party: NoShowParty,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TaskBulkUpdateRequest {
    #[serde(default)]
    pub(crate) acting_caregiver: Option<CaregiverId>,
    pub(crate) tasks: Vec<TaskUpdate>,
}

fn error_response(error: SchedulingError) -> Response {
    let status = match error.kind() {
        SchedulingErrorKind::NotFound => StatusCode::NOT_FOUND,
        SchedulingErrorKind::Forbidden => StatusCode::FORBIDDEN,
        SchedulingErrorKind::Conflict => StatusCode::CONFLICT,
        SchedulingErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        SchedulingErrorKind::LocationInvalid => StatusCode::UNPROCESSABLE_ENTITY,
        SchedulingErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = match &error {
        SchedulingError::ScheduleConflict { conflicts } => json!({
            "error": error.to_string(),
            "conflicts": conflicts,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, axum::Json(body)).into_response()
}

pub(crate) async fn create_visit_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    axum::Json(new_visit): axum::Json<NewVisit>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.create_visit(new_visit) {
        Ok(visit) => (StatusCode::CREATED, axum::Json(visit)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_visit_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    Path(visit_id): Path<String>,
    axum::Json(update): axum::Json<VisitUpdate>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.update_visit(&VisitId(visit_id), update) {
        Ok(visit) => (StatusCode::OK, axum::Json(visit)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_visit_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    Path(visit_id): Path<String>,
    axum::Json(request): axum::Json<CancelVisitRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.cancel_visit(&VisitId(visit_id), request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn no_show_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    Path(visit_id): Path<String>,
    axum::Json(request): axum::Json<NoShowRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.mark_no_show(&VisitId(visit_id), request.party) {
        Ok(visit) => (StatusCode::OK, axum::Json(visit)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn clock_in_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    Path(visit_id): Path<String>,
    axum::Json(request): axum::Json<ClockInRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.clock_in(&VisitId(visit_id), request) {
        Ok(event) => (StatusCode::OK, axum::Json(event)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn clock_out_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    Path(visit_id): Path<String>,
    axum::Json(request): axum::Json<ClockOutRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.clock_out(&VisitId(visit_id), request) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_tasks_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    Path(visit_id): Path<String>,
    axum::Json(request): axum::Json<TaskBulkUpdateRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.update_tasks(
        &VisitId(visit_id),
        request.acting_caregiver.as_ref(),
        &request.tasks,
    ) {
        Ok(visit) => (StatusCode::OK, axum::Json(visit)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn check_conflicts_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    axum::Json(query): axum::Json<ConflictQuery>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.check_conflicts(&query) {
        Ok(conflicts) => (StatusCode::OK, axum::Json(conflicts)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bulk_schedule_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    axum::Json(request): axum::Json<BulkScheduleRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.create_bulk_schedule(request) {
        Ok(outcome) => (StatusCode::CREATED, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rank_caregivers_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    axum::Json(request): axum::Json<MatchRequest>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.rank_caregivers(&request) {
        Ok(matches) => (StatusCode::OK, axum::Json(matches)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn visit_stats_handler<R, D, V>(
    State(scheduler): State<Arc<VisitScheduler<R, D, V>>>,
    axum::Json(query): axum::Json<VisitStatsQuery>,
) -> Response
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    match scheduler.visit_stats(&query) {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(error) => error_response(error),
    }
}
