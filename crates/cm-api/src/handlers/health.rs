use axum::{Json, extract::State};
use serde_json::json;

use cm_common::api::HealthResponse;

use crate::SharedState;
use crate::error::ApiError;

pub async fn livez() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn readyz(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.readiness.load(std::sync::atomic::Ordering::SeqCst) {
        return Err(ApiError::ServiceUnavailable("shutting_down".into()));
    }

    Ok(Json(json!({
        "status": "ok",
        "engines": state.gateway.registry().len(),
        "nursesLoaded": state.gateway.catalog().len(),
        "application": env!("CARGO_PKG_NAME"),
    })))
}

/// Aggregate engine health. Always 200; `ok` carries the verdict.
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let health = state.gateway.health().await;
    for status in health.engine_statuses.iter().filter(|s| !s.ok) {
        cm_metrics::record_engine_unhealthy(&status.name);
    }
    Json(health)
}
