use std::time::Instant;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
};
use serde::Deserialize;
use tracing::debug;

use cm_common::api::{MatchRequest, MatchResponse};
use cm_common::registry::EngineRegistry;

use crate::SharedState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct EngineParam {
    pub engine: Option<String>,
}

/// Metric label for a requested engine. Only registered names become labels
/// so arbitrary client input cannot create new series.
fn engine_label(registry: &EngineRegistry, requested: Option<&str>) -> &'static str {
    match requested.map(str::trim).filter(|name| !name.is_empty()) {
        None => "default",
        Some(name) => registry
            .get(name)
            .map(|engine| engine.name())
            .unwrap_or("unknown"),
    }
}

pub async fn run_match(
    State(state): State<SharedState>,
    Query(params): Query<EngineParam>,
    body: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchResponse>, ApiError> {
    let started = Instant::now();
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let label = engine_label(
        state.gateway.registry(),
        params.engine.as_deref().or(request.engine.as_deref()),
    );
    debug!(engine = label, "match_request_received");

    match state.gateway.run_match(request, params.engine).await {
        Ok(response) => {
            cm_metrics::record_match(&response.engine, "ok", started.elapsed(), response.count);
            Ok(Json(response))
        }
        Err(err) => {
            let err = ApiError::from(err);
            cm_metrics::record_match(label, err.code(), started.elapsed(), 0);
            Err(err)
        }
    }
}
