//! Wire DTOs shared by the HTTP layer and the gateway.

pub mod health;
pub mod match_request;
pub mod match_response;

pub use health::{EngineInfo, EngineStatus, HealthResponse};
pub use match_request::MatchRequest;
pub use match_response::MatchResponse;
