//! Routers for the three services.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use incidentops_core::api::now_ts;

use crate::http::{
    models::*,
    state::{DispatchState, RelayState, WorkerState},
    ws::ws_events_handler,
};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Both start paths are served: the gateway strips `/api/scenarios` before
/// forwarding.
pub fn dispatch_router(state: DispatchState) -> Router {
    Router::new()
        .route("/api/scenarios/:scenario/start", post(start_handler))
        .route("/:scenario/start", post(start_handler))
        .route("/health", get(dispatch_health_handler))
        .with_state(state)
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/ws/events", get(ws_events_handler))
        .route("/health", get(relay_health_handler))
        .with_state(state)
}

pub fn worker_router(state: WorkerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(worker_health_handler))
        .with_state(state)
}

/// POST /api/scenarios/{scenario}/start and /{scenario}/start
async fn start_handler(
    State(state): State<DispatchState>,
    Path(scenario): Path<String>,
) -> Result<(StatusCode, Json<StartResponse>), HttpServerError> {
    let ack = state.service.start(&scenario).await?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

async fn dispatch_health_handler() -> Json<DispatchHealth> {
    Json(DispatchHealth {
        status: "ok".into(),
        service: "scenario-runner".into(),
        ts: now_ts(),
    })
}

async fn relay_health_handler() -> Json<RelayHealth> {
    Json(RelayHealth { ok: true })
}

async fn worker_health_handler() -> Json<WorkerHealth> {
    Json(WorkerHealth {
        status: "ok".into(),
        service: "worker".into(),
    })
}

/// GET /metrics - Prometheus text exposition
async fn metrics_handler(
    State(state): State<WorkerState>,
) -> Result<impl IntoResponse, HttpServerError> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| HttpServerError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body))
}
