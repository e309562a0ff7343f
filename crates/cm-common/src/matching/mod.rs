//! Shared filter -> score -> rank -> explain pipeline.
//!
//! Engines plug in through [`pipeline::MatchHeuristics`]; they decide how
//! lenient the city/service filters are and how each factor is scored, while
//! filter order, ranking and the result shape stay identical across engines.

pub mod filters;
pub mod pipeline;
pub mod query;
pub mod scoring;
pub mod weights;

pub use filters::{Candidate, FilterStage};
pub use pipeline::{MatchHeuristics, compare_results, run_pipeline};
pub use query::{DEFAULT_TOP_K, MAX_TOP_K, Query};
pub use scoring::{FactorScore, FactorScores, MatchOutcome, MatchResult, ScoreBreakdown, UrgencyBonus};
pub use weights::Weights;
