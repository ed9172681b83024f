use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::clock::Clock;
use super::domain::{
    Actor, ApplicationId, ApplicationStatus, ClubId, ClubSlot, CycleId, CycleStatus, CycleUpdate,
    EvaluatorAssignment, FormId, NewCycle, NewForm, NewRound, Role, RoundId, RoundUpdate,
    SubmitApplication, UserId,
};
use super::repository::{AuditSink, RecruitmentRepository, RepositoryError};
use super::service::{RecruitmentError, RecruitmentService};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

type SharedService<R, A, C> = Arc<RecruitmentService<R, A, C>>;

/// Router builder exposing cycle administration, application intake, ranking,
/// and allocation endpoints.
pub fn recruitment_router<R, A, C>(service: SharedService<R, A, C>) -> Router
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/api/v1/cycles", post(create_cycle_handler::<R, A, C>))
        .route(
            "/api/v1/cycles/:cycle_id",
            patch(update_cycle_handler::<R, A, C>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/transition",
            post(transition_handler::<R, A, C>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/rounds",
            post(create_round_handler::<R, A, C>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/allocate",
            post(allocate_handler::<R, A, C>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/complete",
            post(complete_handler::<R, A, C>),
        )
        .route(
            "/api/v1/cycles/:cycle_id/evaluators/:club_id/:user_id",
            delete(remove_evaluator_handler::<R, A, C>),
        )
        .route(
            "/api/v1/rounds/:round_id",
            patch(update_round_handler::<R, A, C>).delete(delete_round_handler::<R, A, C>),
        )
        .route(
            "/api/v1/rounds/:round_id/clubs",
            put(configure_clubs_handler::<R, A, C>),
        )
        .route(
            "/api/v1/rounds/:round_id/clubs/:club_id/form",
            get(club_form_handler::<R, A, C>),
        )
        .route(
            "/api/v1/rounds/:round_id/applications",
            get(round_applications_handler::<R, A, C>),
        )
        .route("/api/v1/forms", put(upsert_form_handler::<R, A, C>))
        .route(
            "/api/v1/forms/:form_id",
            delete(delete_form_handler::<R, A, C>),
        )
        .route("/api/v1/evaluators", post(assign_evaluator_handler::<R, A, C>))
        .route("/api/v1/applications", post(submit_handler::<R, A, C>))
        .route(
            "/api/v1/applications/:application_id",
            get(view_handler::<R, A, C>).delete(cancel_handler::<R, A, C>),
        )
        .route(
            "/api/v1/applications/:application_id/rank",
            put(rank_handler::<R, A, C>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            put(status_handler::<R, A, C>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: CycleStatus,
}

#[derive(Debug, Deserialize)]
pub struct ClubsRequest {
    pub clubs: Vec<ClubSlot>,
}

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct ClubFilter {
    #[serde(default)]
    pub club_id: Option<ClubId>,
}

/// Identity headers set by the upstream identity layer.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let id = read(ACTOR_ID_HEADER).ok_or_else(|| unauthorized("missing x-actor-id header"))?;
    let role = read(ACTOR_ROLE_HEADER)
        .and_then(Role::parse)
        .ok_or_else(|| unauthorized("missing or unknown x-actor-role header"))?;

    Ok(Actor::new(id, role))
}

fn unauthorized(message: &str) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
}

pub(crate) fn status_for(error: &RecruitmentError) -> StatusCode {
    match error {
        RecruitmentError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        RecruitmentError::NotFound { .. } => StatusCode::NOT_FOUND,
        RecruitmentError::InvalidState(_) => StatusCode::CONFLICT,
        RecruitmentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RecruitmentError::NoEligibleRound(_) => StatusCode::CONFLICT,
        RecruitmentError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        RecruitmentError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        RecruitmentError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn no_content(result: Result<(), RecruitmentError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => respond::<()>(Err(error), StatusCode::NO_CONTENT),
    }
}

fn respond<T: Serialize>(result: Result<T, RecruitmentError>, success: StatusCode) -> Response {
    match result {
        Ok(body) => (success, axum::Json(body)).into_response(),
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (status_for(&error), axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn create_cycle_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewCycle>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service
        .create_cycle(&actor, request)
        .map(|(cycle, round)| json!({ "cycle": cycle, "round": round }));
    respond(result, StatusCode::CREATED)
}

pub(crate) async fn update_cycle_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
    axum::Json(update): axum::Json<CycleUpdate>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.update_cycle(&actor, &CycleId::new(cycle_id), update),
        StatusCode::OK,
    )
}

pub(crate) async fn transition_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.transition_cycle(&actor, &CycleId::new(cycle_id), request.status),
        StatusCode::OK,
    )
}

pub(crate) async fn create_round_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
    axum::Json(request): axum::Json<NewRound>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.create_round(&actor, &CycleId::new(cycle_id), request),
        StatusCode::CREATED,
    )
}

pub(crate) async fn allocate_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.allocate(&actor, &CycleId::new(cycle_id)),
        StatusCode::OK,
    )
}

pub(crate) async fn complete_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(cycle_id): Path<String>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.complete_cycle(&actor, &CycleId::new(cycle_id)),
        StatusCode::OK,
    )
}

pub(crate) async fn update_round_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(round_id): Path<String>,
    axum::Json(update): axum::Json<RoundUpdate>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.update_round(&actor, &RoundId::new(round_id), update),
        StatusCode::OK,
    )
}

pub(crate) async fn delete_round_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(round_id): Path<String>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    no_content(service.delete_round(&actor, &RoundId::new(round_id)))
}

pub(crate) async fn configure_clubs_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(round_id): Path<String>,
    axum::Json(request): axum::Json<ClubsRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.configure_round_clubs(&actor, &RoundId::new(round_id), request.clubs),
        StatusCode::OK,
    )
}

pub(crate) async fn club_form_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    Path((round_id, club_id)): Path<(String, String)>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    respond(
        service.club_form(&RoundId::new(round_id), &ClubId::new(club_id)),
        StatusCode::OK,
    )
}

pub(crate) async fn round_applications_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(round_id): Path<String>,
    Query(filter): Query<ClubFilter>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.round_applications(&actor, &RoundId::new(round_id), filter.club_id.as_ref()),
        StatusCode::OK,
    )
}

pub(crate) async fn upsert_form_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewForm>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(service.upsert_form(&actor, request), StatusCode::OK)
}

pub(crate) async fn assign_evaluator_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    axum::Json(assignment): axum::Json<EvaluatorAssignment>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let echo = assignment.clone();
    respond(
        service.assign_evaluator(&actor, assignment).map(|()| echo),
        StatusCode::CREATED,
    )
}

pub(crate) async fn delete_form_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(form_id): Path<String>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    no_content(service.delete_form(&actor, &FormId::new(form_id)))
}

pub(crate) async fn remove_evaluator_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path((cycle_id, club_id, user_id)): Path<(String, String, String)>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let assignment = EvaluatorAssignment {
        user_id: UserId::new(user_id),
        club_id: ClubId::new(club_id),
        cycle_id: CycleId::new(cycle_id),
    };
    no_content(service.remove_evaluator(&actor, &assignment))
}

pub(crate) async fn submit_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SubmitApplication>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service
        .submit_application(&actor, request)
        .map(|application| application.view(None));
    respond(result, StatusCode::CREATED)
}

pub(crate) async fn view_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.application_view(&actor, &ApplicationId::new(application_id)),
        StatusCode::OK,
    )
}

pub(crate) async fn cancel_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    no_content(service.cancel_application(&actor, &ApplicationId::new(application_id)))
}

pub(crate) async fn rank_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<RankRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    respond(
        service.set_rank(
            &actor,
            &ApplicationId::new(application_id),
            request.rank,
            request.note,
        ),
        StatusCode::OK,
    )
}

pub(crate) async fn status_handler<R, A, C>(
    State(service): State<SharedService<R, A, C>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let result = service
        .set_status(&actor, &ApplicationId::new(application_id), request.status)
        .map(|application| application.view(None));
    respond(result, StatusCode::OK)
}
