use std::collections::BTreeSet;

use strsim::normalized_damerau_levenshtein;

use crate::Provider;
use crate::corrections::canonicalize_term;
use crate::matching::filters::overlaps;
use crate::matching::{
    Candidate, FactorScores, MatchHeuristics, MatchOutcome, Query, ScoreBreakdown, UrgencyBonus, Weights,
    run_pipeline,
};
use crate::normalize::{RATING_MAX, RATING_MIN, normalize_token};

use super::{ENGINE_FUZZY, EngineAdapter, EngineError, EngineHealth, weights_health};

/// Rating only breaks ties here; expertise overlap carries the weight instead.
pub const FUZZY_WEIGHTS: Weights = Weights {
    service: 0.30,
    location: 0.20,
    rating: 0.0,
    availability: 0.20,
    experience: 0.30,
};

pub const CITY_SIMILARITY_THRESHOLD: f64 = 0.8;
pub const SERVICE_SIMILARITY_THRESHOLD: f64 = 0.6;
/// Distance decay never uses a radius smaller than this.
pub const MIN_DECAY_RADIUS_KM: f64 = 50.0;
pub const URGENCY_BONUS_RATIO: f64 = 0.10;

pub const FUZZY_CITY_ALIASES: &[(&str, &str)] = &[
    ("tel aviv yafo", "tel aviv"),
    ("tel aviv jaffa", "tel aviv"),
    ("tlv", "tel aviv"),
    ("jlm", "jerusalem"),
    ("petah tikva", "petach tikva"),
    ("netanya", "nethanya"),
    ("beersheba", "beer sheva"),
    ("be'er sheva", "beer sheva"),
    ("rishon lezion", "rishon letsiyon"),
];

fn alias_of(normalized: &str) -> Option<&'static str> {
    FUZZY_CITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| *canonical)
}

fn similar_city(wanted: &str, name: &str) -> bool {
    if overlaps(wanted, name) {
        return true;
    }
    let wanted = alias_of(wanted).unwrap_or(wanted);
    let name = alias_of(name).unwrap_or(name);
    wanted == name || normalized_damerau_levenshtein(wanted, name) >= CITY_SIMILARITY_THRESHOLD
}

/// Best similarity of one requested term to the provider's services.
/// Below the threshold counts as no match at all.
fn term_similarity(term: &str, provider: &Provider) -> f64 {
    let needle = normalize_token(term);
    if needle.is_empty() {
        return 0.0;
    }
    if canonicalize_term(term)
        .iter()
        .any(|tag| provider.service_tags.contains(tag))
    {
        return 1.0;
    }

    let labels = provider.service_tags.iter().map(|tag| tag.label().to_string());
    let codes = provider.specializations.iter().map(|code| normalize_token(code));
    let best = labels
        .chain(codes)
        .map(|candidate| {
            if overlaps(&needle, &candidate) {
                1.0
            } else {
                normalized_damerau_levenshtein(&needle, &candidate)
            }
        })
        .fold(0.0, f64::max);

    if best >= SERVICE_SIMILARITY_THRESHOLD { best } else { 0.0 }
}

fn service_score(query: &Query, provider: &Provider) -> f64 {
    if !query.has_service_query() {
        return 0.5;
    }
    let total: f64 = query
        .service_query
        .iter()
        .map(|term| term_similarity(term, provider))
        .sum();
    total / query.service_query.len() as f64
}

fn expertise_score(query: &Query, provider: &Provider) -> f64 {
    let wanted = query
        .expertise_query
        .iter()
        .map(|term| normalize_token(term))
        .filter(|term| !term.is_empty())
        .collect::<BTreeSet<_>>();
    if wanted.is_empty() {
        return 0.5;
    }
    let offered = provider
        .expertise_tags
        .iter()
        .map(|tag| normalize_token(tag))
        .collect::<BTreeSet<_>>();
    let union = wanted.union(&offered).count();
    if union == 0 {
        return 0.0;
    }
    wanted.intersection(&offered).count() as f64 / union as f64
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

/// Synonym-tolerant engine: edit-distance city and service matching.
#[derive(Debug, Clone, Default)]
pub struct FuzzyEngine;

impl FuzzyEngine {
    pub fn new() -> Self {
        Self
    }
}

impl MatchHeuristics for FuzzyEngine {
    fn weights(&self) -> Weights {
        FUZZY_WEIGHTS
    }

    fn city_matches(&self, city: &str, provider: &Provider) -> bool {
        let wanted = normalize_token(city);
        provider
            .city_names()
            .any(|name| similar_city(&wanted, &normalize_token(name)))
    }

    fn service_matches(&self, query: &Query, provider: &Provider) -> bool {
        query
            .service_query
            .iter()
            .any(|term| term_similarity(term, provider) > 0.0)
    }

    fn score(&self, query: &Query, candidate: &Candidate<'_>) -> FactorScores {
        let provider = candidate.provider;
        let service = service_score(query, provider);
        let expertise = expertise_score(query, provider);

        let location = match candidate.distance_km {
            None => (0.5, "distance unknown".to_string()),
            Some(distance) => {
                let radius = query.radius_km.unwrap_or(MIN_DECAY_RADIUS_KM).max(MIN_DECAY_RADIUS_KM);
                ((1.0 - distance / radius).max(0.0), format!("{distance:.1} km away"))
            }
        };
        let rating = (provider.rating - RATING_MIN) / (RATING_MAX - RATING_MIN);

        FactorScores {
            service: (service, format!("services≈{}", percent(service))),
            location,
            rating: (rating, format!("rating {:.1}", provider.rating)),
            availability: (
                candidate.availability_ratio,
                format!("availability≈{}", percent(candidate.availability_ratio)),
            ),
            experience: (expertise, format!("expertise≈{}", percent(expertise))),
        }
    }

    fn urgency_bonus(&self, _query: &Query, base: f64) -> Option<UrgencyBonus> {
        Some(UrgencyBonus {
            value: base * URGENCY_BONUS_RATIO,
            explanation: "urgent +10%".into(),
        })
    }

    fn explain(&self, _query: &Query, candidate: &Candidate<'_>, breakdown: &ScoreBreakdown) -> String {
        let mut parts = vec![
            format!("services≈{}", percent(breakdown.service.score)),
            format!("expertise≈{}", percent(breakdown.experience.score)),
            format!("availability≈{}", percent(breakdown.availability.score)),
        ];
        if let Some(distance) = candidate.distance_km {
            parts.push(format!("distance≈{distance:.1}km"));
        }
        if breakdown.urgency_bonus.is_some() {
            parts.push("urgent +10%".into());
        }
        parts.join(" · ")
    }
}

impl EngineAdapter for FuzzyEngine {
    fn name(&self) -> &'static str {
        ENGINE_FUZZY
    }

    fn match_query(&self, query: &Query, providers: &[Provider]) -> Result<MatchOutcome, EngineError> {
        run_pipeline(self, query, providers)
    }

    fn health(&self) -> EngineHealth {
        weights_health(FUZZY_WEIGHTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrections::ServiceTag;
    use crate::engines::fixtures::{HAIFA, provider};

    #[test]
    fn weights_are_valid_and_distinct_from_basic() {
        assert!(FUZZY_WEIGHTS.is_valid());
        assert_ne!(FUZZY_WEIGHTS, crate::engines::basic::BASIC_WEIGHTS);
    }

    #[test]
    fn rating_carries_no_weight() {
        assert_eq!(FUZZY_WEIGHTS.rating, 0.0);
        assert_eq!(FUZZY_WEIGHTS.experience, 0.30);
        assert!((FUZZY_WEIGHTS.sum() - 1.0).abs() < 1e-9);

        let q = Query::default();
        let mut low = provider("low", "Haifa", &[ServiceTag::WoundCare]);
        low.rating = 3.5;
        let mut high = provider("high", "Haifa", &[ServiceTag::WoundCare]);
        high.rating = 5.0;
        let outcome = FuzzyEngine::new().match_query(&q, &[low, high]).unwrap();
        assert_eq!(outcome.results[0].score, outcome.results[1].score);
        assert_eq!(outcome.results[0].id, "high");
    }

    #[test]
    fn city_filter_tolerates_typos_and_aliases() {
        let engine = FuzzyEngine::new();
        let ta = provider("ta", "Tel Aviv", &[]);
        assert!(engine.city_matches("tel aviv", &ta));
        assert!(engine.city_matches("Tel Avivv", &ta));
        assert!(engine.city_matches("TLV", &ta));
        assert!(!engine.city_matches("Haifa", &ta));
    }

    #[test]
    fn city_filter_accepts_partial_names_both_ways() {
        let engine = FuzzyEngine::new();
        let rishon = provider("r", "Rishon LeTsiyon", &[]);
        let petach = provider("p", "Petach Tikva", &[]);
        assert!(engine.city_matches("Rishon", &rishon));
        assert!(engine.city_matches("Petach", &petach));
        assert!(engine.city_matches("Petach Tikva Center", &petach));
        assert!(!engine.city_matches("Haifa", &petach));
    }

    #[test]
    fn misspelled_service_still_matches() {
        let p = provider("p", "Haifa", &[ServiceTag::Medication]);
        assert_eq!(term_similarity("medication", &p), 1.0);
        assert!(term_similarity("medicaton", &p) >= SERVICE_SIMILARITY_THRESHOLD);
        assert_eq!(term_similarity("stoma", &p), 0.0);
    }

    #[test]
    fn service_score_averages_requested_terms() {
        let p = provider("p", "Haifa", &[ServiceTag::WoundCare]);
        let q = Query {
            service_query: vec!["wound care".into(), "stoma".into()],
            ..Default::default()
        };
        assert!((service_score(&q, &p) - 0.5).abs() < 1e-9);
        assert!(FuzzyEngine::new().service_matches(&q, &p));
    }

    #[test]
    fn expertise_uses_jaccard_overlap() {
        let mut p = provider("p", "Haifa", &[]);
        p.expertise_tags = BTreeSet::from(["night-shift".to_string(), "experienced".to_string()]);
        let q = Query {
            expertise_query: vec!["night-shift".into()],
            ..Default::default()
        };
        assert!((expertise_score(&q, &p) - 0.5).abs() < 1e-9);
        assert_eq!(expertise_score(&Query::default(), &p), 0.5);
    }

    #[test]
    fn rating_is_scaled_from_the_valid_range() {
        let mut p = provider("p", "Haifa", &[]);
        p.rating = 5.0;
        let outcome = FuzzyEngine::new().match_query(&Query::default(), &[p]).unwrap();
        assert_eq!(outcome.results[0].score_breakdown.rating.score, 1.0);
    }

    #[test]
    fn reason_reports_percentages_and_urgency() {
        let q = Query {
            urgent: true,
            location: Some(HAIFA),
            ..Default::default()
        };
        let outcome = FuzzyEngine::new()
            .match_query(&q, &[provider("hf", "Haifa", &[ServiceTag::General])])
            .unwrap();
        let result = &outcome.results[0];
        assert_eq!(
            result.reason,
            "services≈50% · expertise≈50% · availability≈100% · distance≈0.0km · urgent +10%"
        );
        let breakdown = &result.score_breakdown;
        assert!((breakdown.total - breakdown.base * 1.1).abs() < 1e-9);
    }
}
