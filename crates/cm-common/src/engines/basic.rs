use crate::Provider;
use crate::corrections::canonicalize_term;
use crate::matching::filters::overlaps;
use crate::matching::{
    Candidate, FactorScores, MatchHeuristics, MatchOutcome, Query, UrgencyBonus, Weights, run_pipeline,
};
use crate::normalize::normalize_token;

use super::{ENGINE_BASIC, EngineAdapter, EngineError, EngineHealth, weights_health};

pub const BASIC_WEIGHTS: Weights = Weights {
    service: 0.30,
    location: 0.25,
    rating: 0.20,
    availability: 0.15,
    experience: 0.10,
};

pub const BASIC_DEFAULT_RADIUS_KM: f64 = 25.0;
pub const BASIC_URGENCY_BONUS: f64 = 0.05;

/// Spelling variants folded onto one name before the substring check.
pub const BASIC_CITY_ALIASES: &[(&str, &str)] = &[
    ("tel aviv yafo", "tel aviv"),
    ("tel aviv jaffa", "tel aviv"),
    ("tlv", "tel aviv"),
    ("jaffa", "tel aviv"),
    ("yafo", "tel aviv"),
    ("תל אביב", "tel aviv"),
    ("ירושלים", "jerusalem"),
    ("חיפה", "haifa"),
    ("petah tikva", "petach tikva"),
    ("petah tiqwa", "petach tikva"),
    ("netanya", "nethanya"),
    ("rishon lezion", "rishon letsiyon"),
    ("beersheba", "beer sheva"),
    ("rehovot", "rehovoth"),
];

fn canonical_city(normalized: &str) -> &str {
    BASIC_CITY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map_or(normalized, |(_, canonical)| canonical)
}

/// How well one requested term matches: 1.0 exact tag, 0.8 same canonical
/// group, 0.6 partial text overlap, 0.0 otherwise.
fn term_score(term: &str, provider: &Provider) -> f64 {
    let needle = normalize_token(term);
    if needle.is_empty() {
        return 0.0;
    }
    let exact = provider
        .service_tags
        .iter()
        .any(|tag| tag.label() == needle || normalize_token(tag.as_ref()) == needle);
    if exact {
        return 1.0;
    }
    if canonicalize_term(term)
        .iter()
        .any(|tag| provider.service_tags.contains(tag))
    {
        return 0.8;
    }
    let partial = provider
        .service_tags
        .iter()
        .any(|tag| overlaps(&needle, tag.label()))
        || provider
            .specializations
            .iter()
            .any(|code| overlaps(&needle, &normalize_token(code)));
    if partial { 0.6 } else { 0.0 }
}

fn service_score(query: &Query, provider: &Provider) -> (f64, String) {
    if !query.has_service_query() {
        return (0.5, "לא התבקש שירות | no service requested".into());
    }
    let best = query
        .service_query
        .iter()
        .map(|term| term_score(term, provider))
        .fold(0.0, f64::max);
    let text = if best >= 1.0 {
        "התאמה מלאה לשירות | exact service match"
    } else if best >= 0.8 {
        "שירות קשור | related service"
    } else {
        "התאמה חלקית לשירות | partial service match"
    };
    (best, text.into())
}

fn location_score(query: &Query, candidate: &Candidate<'_>) -> (f64, String) {
    if query.location.is_none() {
        return (1.0, "לא צוין מיקום | no location requested".into());
    }
    match candidate.distance_km {
        None => (0.5, "מיקום הספק לא ידוע | provider location unknown".into()),
        Some(distance) => {
            let radius = query.radius_km.unwrap_or(BASIC_DEFAULT_RADIUS_KM);
            let score = (1.0 - distance / radius).max(0.0);
            (score, format!("מרחק {distance:.1} ק\"מ | {distance:.1} km away"))
        }
    }
}

fn rating_score(provider: &Provider) -> (f64, String) {
    let confidence = 1.0 - (-0.05 * f64::from(provider.review_count)).exp();
    let score = (provider.rating / 5.0) * confidence;
    (
        score,
        format!(
            "דירוג {:.1} ({} ביקורות) | rated {:.1} from {} reviews",
            provider.rating, provider.review_count, provider.rating, provider.review_count
        ),
    )
}

fn experience_score(provider: &Provider) -> (f64, String) {
    let breadth = (provider.specializations.len() as f64 / 5.0).min(1.0);
    let volume = (f64::from(provider.review_count) / 200.0).min(1.0);
    (
        0.5 * breadth + 0.5 * volume,
        format!(
            "{} התמחויות | {} specializations",
            provider.specializations.len(),
            provider.specializations.len()
        ),
    )
}

/// Deterministic rule filter with exact/related/partial service grading.
#[derive(Debug, Clone, Default)]
pub struct BasicEngine;

impl BasicEngine {
    pub fn new() -> Self {
        Self
    }
}

impl MatchHeuristics for BasicEngine {
    fn weights(&self) -> Weights {
        BASIC_WEIGHTS
    }

    fn default_radius_km(&self) -> Option<f64> {
        Some(BASIC_DEFAULT_RADIUS_KM)
    }

    fn city_matches(&self, city: &str, provider: &Provider) -> bool {
        let wanted = normalize_token(city);
        let wanted_canonical = canonical_city(&wanted);
        provider.city_names().any(|name| {
            let name = normalize_token(name);
            overlaps(&wanted, &name) || overlaps(wanted_canonical, canonical_city(&name))
        })
    }

    fn service_matches(&self, query: &Query, provider: &Provider) -> bool {
        query
            .service_query
            .iter()
            .any(|term| term_score(term, provider) > 0.0)
    }

    fn score(&self, query: &Query, candidate: &Candidate<'_>) -> FactorScores {
        let provider = candidate.provider;
        let ratio = candidate.availability_ratio;
        FactorScores {
            service: service_score(query, provider),
            location: location_score(query, candidate),
            rating: rating_score(provider),
            availability: (
                ratio,
                format!("זמינות {:.0}% | {:.0}% available", ratio * 100.0, ratio * 100.0),
            ),
            experience: experience_score(provider),
        }
    }

    fn urgency_bonus(&self, _query: &Query, _base: f64) -> Option<UrgencyBonus> {
        Some(UrgencyBonus {
            value: BASIC_URGENCY_BONUS,
            explanation: "בקשה דחופה | urgent request".into(),
        })
    }
}

impl EngineAdapter for BasicEngine {
    fn name(&self) -> &'static str {
        ENGINE_BASIC
    }

    fn match_query(&self, query: &Query, providers: &[Provider]) -> Result<MatchOutcome, EngineError> {
        run_pipeline(self, query, providers)
    }

    fn health(&self) -> EngineHealth {
        weights_health(BASIC_WEIGHTS)
    }
}
