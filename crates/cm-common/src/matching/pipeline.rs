use std::cmp::Ordering;

use super::filters::{Candidate, FilterStage, evaluate, name_contains};
use super::query::Query;
use super::scoring::{FactorScores, MatchOutcome, MatchResult, ScoreBreakdown, UrgencyBonus};
use super::weights::Weights;
use crate::Provider;
use crate::engines::EngineError;

/// Engine-specific policy plugged into the shared pipeline.
pub trait MatchHeuristics: Send + Sync {
    fn weights(&self) -> Weights;

    /// Radius applied when the query gives coordinates but no `radiusKm`.
    fn default_radius_km(&self) -> Option<f64> {
        None
    }

    fn name_matches(&self, needle: &str, provider: &Provider) -> bool {
        name_contains(needle, provider)
    }

    fn city_matches(&self, city: &str, provider: &Provider) -> bool;

    /// Only called when the query names at least one service.
    fn service_matches(&self, query: &Query, provider: &Provider) -> bool;

    /// Raw factor scores in `[0, 1]` (out-of-range values get clamped).
    fn score(&self, query: &Query, candidate: &Candidate<'_>) -> FactorScores;

    /// Whether the urgency bonus applies. Engines may read urgency from free text.
    fn is_urgent(&self, query: &Query) -> bool {
        query.urgent
    }

    fn urgency_bonus(&self, _query: &Query, _base: f64) -> Option<UrgencyBonus> {
        None
    }

    fn explain(&self, _query: &Query, candidate: &Candidate<'_>, _breakdown: &ScoreBreakdown) -> String {
        matched_summary(&candidate.passed)
    }
}

/// `"matched: city, service, availability"`.
pub fn matched_summary(passed: &[FilterStage]) -> String {
    if passed.is_empty() {
        return "matched: no filters requested".to_string();
    }
    let stages = passed
        .iter()
        .map(|stage| stage.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    format!("matched: {stages}")
}

/// Score desc, rating desc, review count desc, distance asc (unknown last), id asc.
pub fn compare_results(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.rating.total_cmp(&a.rating))
        .then_with(|| b.review_count.cmp(&a.review_count))
        .then_with(|| match (a.distance_km, b.distance_km) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

fn build_result<H>(heuristics: &H, query: &Query, candidate: &Candidate<'_>) -> Result<MatchResult, EngineError>
where
    H: MatchHeuristics + ?Sized,
{
    let weights = heuristics.weights();
    let breakdown = ScoreBreakdown::compose(&weights, heuristics.score(query, candidate));
    let bonus = if heuristics.is_urgent(query) {
        heuristics.urgency_bonus(query, breakdown.base)
    } else {
        None
    };
    let breakdown = breakdown.with_urgency_bonus(bonus);

    let provider = candidate.provider;
    if !breakdown.total.is_finite() {
        return Err(EngineError::NonFiniteScore {
            provider_id: provider.id.clone(),
        });
    }

    Ok(MatchResult {
        id: provider.id.clone(),
        name: provider.display_name.clone(),
        city: provider.city.clone(),
        score: breakdown.total,
        reason: heuristics.explain(query, candidate, &breakdown),
        score_breakdown: breakdown,
        distance_km: candidate.distance_km,
        availability_ratio: candidate.availability_ratio,
        rating: provider.rating,
        review_count: provider.review_count,
        service_tags: provider.service_tags.iter().copied().collect(),
    })
}

/// Filter, score, rank and cut to `top_k`. Inactive or unapproved providers
/// are never considered.
pub fn run_pipeline<H>(heuristics: &H, query: &Query, providers: &[Provider]) -> Result<MatchOutcome, EngineError>
where
    H: MatchHeuristics + ?Sized,
{
    let weights = heuristics.weights();
    if !weights.is_valid() {
        return Err(EngineError::InvalidWeights(weights.sum()));
    }

    let mut results = providers
        .iter()
        .filter(|provider| provider.is_matchable())
        .filter_map(|provider| evaluate(heuristics, query, provider))
        .map(|candidate| build_result(heuristics, query, &candidate))
        .collect::<Result<Vec<_>, _>>()?;

    let candidates = results.len();
    results.sort_by(compare_results);
    results.truncate(query.top_k);

    Ok(MatchOutcome {
        count: results.len(),
        results,
        candidates,
    })
}
