// Dashboard JSON endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

use super::common::{api_error, ApiResponse, ApiResult, HistoryQuery, IncludeDisabledQuery};
use crate::database::CheckRecord;
use crate::health::{NetworkHealth, ValidatorSnapshot};
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub status: String,
    pub uptime_seconds: i64,
    pub persistence_ok: bool,
    pub validators_total: usize,
    pub validators_enabled: usize,
    pub validators_healthy: usize,
    pub last_tick: Option<String>,
    pub network: String,
    pub network_health: BTreeMap<String, NetworkHealth>,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusSummary> {
    let snapshot = state.health_monitor.snapshot().await;
    Ok(Json(ApiResponse::success(StatusSummary {
        status: snapshot.status.clone(),
        uptime_seconds: snapshot.uptime_seconds,
        persistence_ok: snapshot.persistence_ok,
        validators_total: snapshot.validators.len(),
        validators_enabled: snapshot.enabled_count(),
        validators_healthy: snapshot.healthy_count(),
        last_tick: snapshot.last_tick.map(|t| t.to_rfc3339()),
        network: snapshot.network,
        network_health: snapshot.network_health,
    })))
}

pub async fn get_all_validators(
    Query(query): Query<IncludeDisabledQuery>,
    State(state): State<AppState>,
) -> ApiResult<BTreeMap<String, ValidatorSnapshot>> {
    let snapshot = state.health_monitor.snapshot().await;
    let validators = snapshot
        .validators
        .into_iter()
        .filter(|(_, v)| query.include_disabled || v.enabled)
        .collect();
    Ok(Json(ApiResponse::success(validators)))
}

pub async fn get_validator(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<ValidatorSnapshot> {
    let mut snapshot = state.health_monitor.snapshot().await;
    match snapshot.validators.remove(&name) {
        Some(validator) => Ok(Json(ApiResponse::success(validator))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Validator {} not found", name),
        )),
    }
}

pub async fn get_validator_history(
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> ApiResult<Vec<CheckRecord>> {
    if !state.config.validators.contains_key(&name) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Validator {} not found", name),
        ));
    }

    let Some(database) = &state.database else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "History database is not available".to_string(),
        ));
    };

    match database.get_check_history(&name, query.limit.clamp(1, 1000)).await {
        Ok(records) => Ok(Json(ApiResponse::success(records))),
        Err(e) => {
            error!("Failed to load history for {}: {}", name, e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
