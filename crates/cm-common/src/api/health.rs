use serde::Serialize;

/// Result of one engine's health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub name: String,
    pub ok: bool,
    pub message: String,
}

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// True when at least one engine is registered and every engine is healthy.
    pub ok: bool,
    pub engines: usize,
    pub nurses_loaded: usize,
    pub engine_statuses: Vec<EngineStatus>,
}

impl HealthResponse {
    pub fn new(nurses_loaded: usize, engine_statuses: Vec<EngineStatus>) -> Self {
        Self {
            ok: !engine_statuses.is_empty() && engine_statuses.iter().all(|s| s.ok),
            engines: engine_statuses.len(),
            nurses_loaded,
            engine_statuses,
        }
    }
}

/// One entry of `GET /engines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    pub name: String,
    pub healthy: bool,
    /// Healthy and the provider collection it needs is loaded.
    pub configured: bool,
    pub message: String,
}

impl EngineInfo {
    pub fn from_status(status: EngineStatus, has_providers: bool) -> Self {
        Self {
            configured: status.ok && has_providers,
            healthy: status.ok,
            name: status.name,
            message: status.message,
        }
    }
}
