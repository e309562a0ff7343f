use serde::Serialize;

use crate::matching::MatchResult;

/// `/match` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResponse {
    /// Engine that produced the results.
    pub engine: String,
    /// Wall time spent inside the engine call.
    pub latency_ms: u64,
    pub count: usize,
    pub results: Vec<MatchResult>,
}
