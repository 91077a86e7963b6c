// Liveness, readiness, health and metrics endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::error;

use crate::health::HealthSnapshot;
use crate::web::AppState;

/// Full snapshot; 200 only when every enabled validator is active and state writes succeed
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthSnapshot>) {
    let snapshot = state.health_monitor.snapshot().await;
    let code = if snapshot.status == "healthy" && snapshot.persistence_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(snapshot))
}

/// Ready once the first check tick has completed
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let snapshot = state.health_monitor.snapshot().await;
    let ready = snapshot.last_tick.is_some();
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({ "ready": ready, "timestamp": Utc::now().to_rfc3339() })),
    )
}

pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "alive": true, "timestamp": Utc::now().to_rfc3339() }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.health_monitor.snapshot().await;
    match state.metrics.render(&snapshot) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
