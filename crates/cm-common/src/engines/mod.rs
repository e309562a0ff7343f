pub mod basic;
pub mod fuzzy;
pub mod hebrew_nlp;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::Provider;
use crate::matching::{MatchOutcome, Query};

pub use basic::BasicEngine;
pub use fuzzy::FuzzyEngine;
pub use hebrew_nlp::HebrewNlpEngine;

pub const ENGINE_BASIC: &str = "engine-basic";
pub const ENGINE_FUZZY: &str = "engine-fuzzy";
pub const ENGINE_HEBREW_NLP: &str = "engine-hebrew-nlp";

/// Registration order; the first entry is the default engine.
pub const BUILTIN_ENGINES: &[&str] = &[ENGINE_BASIC, ENGINE_FUZZY, ENGINE_HEBREW_NLP];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("unknown engine: {0}")]
    Unknown(String),
    #[error("engine weights are invalid (sum {0:.3})")]
    InvalidWeights(f64),
    #[error("non-finite score computed for provider {provider_id}")]
    NonFiniteScore { provider_id: String },
    #[error("engine failed: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineHealth {
    pub ok: bool,
    pub message: String,
}

impl EngineHealth {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Contract shared by every matching engine.
///
/// Implementations are synchronous and CPU-bound. The gateway runs them on the
/// blocking pool under a timeout, so `match_query` may take as long as it
/// needs without stalling the runtime.
pub trait EngineAdapter: Send + Sync {
    /// Registry key, e.g. `"engine-basic"`.
    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "v1"
    }

    fn match_query(&self, query: &Query, providers: &[Provider]) -> Result<MatchOutcome, EngineError>;

    /// Side-effect free; safe to call concurrently with matches.
    fn health(&self) -> EngineHealth;
}

/// Build a built-in engine by name.
pub fn create_engine(name: &str) -> Result<Arc<dyn EngineAdapter>, EngineError> {
    match name {
        ENGINE_BASIC => Ok(Arc::new(BasicEngine::new())),
        ENGINE_FUZZY => Ok(Arc::new(FuzzyEngine::new())),
        ENGINE_HEBREW_NLP => Ok(Arc::new(HebrewNlpEngine::new())),
        other => Err(EngineError::Unknown(other.to_string())),
    }
}

/// Health derived from the engine's weight table.
pub(crate) fn weights_health(weights: crate::matching::Weights) -> EngineHealth {
    if weights.is_valid() {
        EngineHealth::ok(format!("ready (weights sum {:.2})", weights.sum()))
    } else {
        EngineHealth::failing(format!("invalid weights (sum {:.3})", weights.sum()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_every_builtin_engine() {
        for name in BUILTIN_ENGINES {
            let engine = create_engine(name).unwrap();
            assert_eq!(engine.name(), *name);
            assert!(engine.health().ok, "{name} unhealthy");
        }
    }

    #[test]
    fn factory_rejects_unknown_names() {
        assert!(matches!(create_engine("engine-foo"), Err(EngineError::Unknown(name)) if name == "engine-foo"));
    }
}
