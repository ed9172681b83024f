use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use club_recruit::recruitment::{
    recruitment_router, AllocationEngine, AllocationInput, AllocationPlan, AllocationStrategy,
    AuditSink, Clock, RecruitmentRepository, RecruitmentService,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Snapshot posted for a dry run. The configured strategy applies unless the
/// request names one.
#[derive(Debug, Deserialize)]
pub(crate) struct PreviewRequest {
    #[serde(flatten)]
    pub(crate) input: AllocationInput,
    #[serde(default)]
    pub(crate) strategy: Option<AllocationStrategy>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreviewResponse {
    pub(crate) strategy: AllocationStrategy,
    pub(crate) allocated_count: usize,
    pub(crate) rejected_count: usize,
    #[serde(flatten)]
    pub(crate) plan: AllocationPlan,
}

pub(crate) fn with_recruitment_routes<R, A, C>(
    service: Arc<RecruitmentService<R, A, C>>,
) -> axum::Router
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    recruitment_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/allocation/preview",
            axum::routing::post(allocation_preview_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn allocation_preview_endpoint(
    Extension(state): Extension<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Json<PreviewResponse> {
    Json(preview(&request.input, request.strategy.unwrap_or(state.strategy)))
}

pub(crate) fn preview(input: &AllocationInput, strategy: AllocationStrategy) -> PreviewResponse {
    let plan = AllocationEngine::new(strategy).run(input);
    PreviewResponse {
        strategy,
        allocated_count: plan.allocated_count(),
        rejected_count: plan.rejected_count(),
        plan,
    }
}
