use axum::{Json, extract::State};

use cm_common::api::EngineInfo;

use crate::SharedState;

/// Registered engines with their health and whether their data is loaded.
pub async fn list_engines(State(state): State<SharedState>) -> Json<Vec<EngineInfo>> {
    let infos = state.gateway.engine_infos(state.config.engines_timeout).await;
    for info in infos.iter().filter(|info| !info.healthy) {
        cm_metrics::record_engine_unhealthy(&info.name);
    }
    Json(infos)
}
