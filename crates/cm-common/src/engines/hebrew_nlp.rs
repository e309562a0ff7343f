//! Bilingual keyword engine.
//!
//! Free-text service terms (Hebrew or English) expand through a keyword table
//! into treatment codes; the service score is the share of those codes the
//! provider offers. Hebrew city names are mapped to the English spelling used
//! in the catalog before matching.

use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;

use crate::Provider;
use crate::corrections::{URGENCY_MARKERS, canonicalize_term, fold_hebrew, has_urgency_marker};
use crate::matching::filters::{name_contains, overlaps};
use crate::matching::pipeline::matched_summary;
use crate::matching::{
    Candidate, FactorScores, MatchHeuristics, MatchOutcome, Query, ScoreBreakdown, UrgencyBonus, Weights,
    run_pipeline,
};
use crate::normalize::normalize_token;

use super::{ENGINE_HEBREW_NLP, EngineAdapter, EngineError, EngineHealth, weights_health};

pub const HEBREW_NLP_WEIGHTS: Weights = Weights {
    service: 0.30,
    location: 0.25,
    rating: 0.20,
    availability: 0.15,
    experience: 0.10,
};

pub const HEBREW_NLP_URGENCY_BONUS: f64 = 0.05;

/// Keyword -> treatment codes it implies.
pub const SERVICE_KEYWORDS: &[(&str, &[&str])] = &[
    ("פצע", &["WOUND_CARE", "WOUND_TREATMENT"]),
    ("פצעים", &["WOUND_CARE", "WOUND_TREATMENT"]),
    ("wound", &["WOUND_CARE", "WOUND_TREATMENT"]),
    ("כוויה", &["BURN_TREATMENT"]),
    ("burn", &["BURN_TREATMENT"]),
    ("סוכרת", &["DIABETIC_WOUND_TREATMENT"]),
    ("diabetic", &["DIABETIC_WOUND_TREATMENT"]),
    ("תרופות", &["MEDICATION", "MEDICATION_ARRANGEMENT"]),
    ("medication", &["MEDICATION", "MEDICATION_ARRANGEMENT"]),
    ("medicine", &["MEDICATION", "MEDICATION_ARRANGEMENT"]),
    ("צנתר", &["CENTRAL_CATHETER_TREATMENT", "CATHETER_INSERTION_REPLACEMENT"]),
    ("catheter", &["CENTRAL_CATHETER_TREATMENT", "CATHETER_INSERTION_REPLACEMENT"]),
    ("סטומה", &["STOMA_TREATMENT"]),
    ("stoma", &["STOMA_TREATMENT"]),
    ("תינוק", &["HOME_NEWBORN_VISIT", "BREASTFEEDING_CONSULTATION"]),
    ("baby", &["HOME_NEWBORN_VISIT", "BREASTFEEDING_CONSULTATION"]),
    ("הנקה", &["BREASTFEEDING_CONSULTATION"]),
    ("breastfeeding", &["BREASTFEEDING_CONSULTATION"]),
    ("ברית", &["DAY_NIGHT_CIRCUMCISION_NURSE"]),
    ("circumcision", &["DAY_NIGHT_CIRCUMCISION_NURSE"]),
    ("דם", &["BLOOD_TESTS"]),
    ("blood", &["BLOOD_TESTS"]),
    ("בדיקה", &["BLOOD_TESTS", "HANDLING_AND_TRACKING_METRICS"]),
    ("test", &["BLOOD_TESTS", "HANDLING_AND_TRACKING_METRICS"]),
    ("ניתוח", &["FOLLOW_UP_AFTER_SURGERY"]),
    ("surgery", &["FOLLOW_UP_AFTER_SURGERY"]),
    ("ליווי", &["ESCORTED_BY_NURSE", "PRIVATE_SECURITY_HOSPITAL", "PRIVATE_SECURITY_HOME"]),
    ("escort", &["ESCORTED_BY_NURSE", "PRIVATE_SECURITY_HOSPITAL"]),
    ("שמירה", &["PRIVATE_SECURITY_HOSPITAL", "PRIVATE_SECURITY_HOME"]),
    ("security", &["PRIVATE_SECURITY_HOSPITAL", "PRIVATE_SECURITY_HOME"]),
];

/// Hebrew city name -> catalog spelling.
pub const CITY_MAPPING: &[(&str, &str)] = &[
    ("תל אביב", "Tel Aviv"),
    ("ירושלים", "Jerusalem"),
    ("חיפה", "Haifa"),
    ("נתניה", "Nethanya"),
    ("פתח תקווה", "Petach Tikva"),
    ("ראשון לציון", "Rishon LeTsiyon"),
    ("רמת גן", "Ramat-Gan"),
    ("בת ים", "Bat-Yam"),
    ("חדרה", "Hadera"),
    ("אשדוד", "Ashdod"),
    ("אשקלון", "Ashkelon"),
    ("באר שבע", "Beer Sheva"),
    ("רחובות", "Rehovoth"),
];

lazy_static! {
    /// Folded Hebrew city name -> catalog spelling.
    static ref FOLDED_CITY_MAPPING: HashMap<String, &'static str> = CITY_MAPPING
        .iter()
        .map(|(hebrew, english)| (fold_hebrew(hebrew), *english))
        .collect();

    /// Keyword table with every keyword pre-folded.
    static ref FOLDED_KEYWORDS: Vec<(String, &'static [&'static str])> = SERVICE_KEYWORDS
        .iter()
        .map(|(keyword, codes)| (fold_hebrew(keyword), *codes))
        .collect();
}

/// Normalized English form of a city name, translating Hebrew names first.
fn english_city(name: &str) -> String {
    let mapped = FOLDED_CITY_MAPPING
        .get(&fold_hebrew(name))
        .copied()
        .unwrap_or(name);
    normalize_token(mapped)
}

/// Treatment codes a free-text term refers to.
fn expand_term(term: &str) -> BTreeSet<String> {
    let folded = fold_hebrew(term);
    let mut codes = FOLDED_KEYWORDS
        .iter()
        .filter(|(keyword, _)| folded.contains(keyword.as_str()))
        .flat_map(|(_, codes)| codes.iter().map(|code| code.to_string()))
        .collect::<BTreeSet<_>>();
    codes.extend(canonicalize_term(term).iter().map(|tag| tag.as_ref().to_string()));
    codes
}

fn provider_codes(provider: &Provider) -> BTreeSet<String> {
    provider
        .specializations
        .iter()
        .map(|code| code.to_uppercase())
        .chain(provider.service_tags.iter().map(|tag| tag.as_ref().to_string()))
        .collect()
}

/// Service terms with urgency markers removed. A term that was only a
/// marker drops out; it signals urgency, not a service.
fn service_terms(query: &Query) -> Vec<String> {
    query
        .service_query
        .iter()
        .filter_map(|term| {
            if !has_urgency_marker(term) {
                return Some(term.clone());
            }
            let remaining = strip_urgency_markers(term);
            (!remaining.is_empty()).then_some(remaining)
        })
        .collect()
}

/// Share of the expanded codes the provider offers.
fn service_coverage(terms: &[String], provider: &Provider) -> f64 {
    let wanted = terms
        .iter()
        .flat_map(|term| expand_term(term))
        .collect::<BTreeSet<_>>();
    if wanted.is_empty() {
        return 0.0;
    }
    let offered = provider_codes(provider);
    wanted.intersection(&offered).count() as f64 / wanted.len() as f64
}

/// Text left after removing urgency markers.
fn strip_urgency_markers(text: &str) -> String {
    let mut folded = fold_hebrew(text);
    for marker in URGENCY_MARKERS {
        folded = folded.replace(&fold_hebrew(marker), " ");
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn distance_tier(distance: f64) -> f64 {
    match distance {
        d if d < 5.0 => 1.0,
        d if d < 10.0 => 0.8,
        d if d < 25.0 => 0.6,
        d if d < 50.0 => 0.4,
        _ => 0.2,
    }
}

fn grade(score: f64, high: &str, mid: &str, low: &str) -> String {
    let text = if score > 0.8 {
        high
    } else if score > 0.5 {
        mid
    } else {
        low
    };
    text.to_string()
}

#[derive(Debug, Clone, Default)]
pub struct HebrewNlpEngine;

impl HebrewNlpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl MatchHeuristics for HebrewNlpEngine {
    fn weights(&self) -> Weights {
        HEBREW_NLP_WEIGHTS
    }

    fn name_matches(&self, needle: &str, provider: &Provider) -> bool {
        if !has_urgency_marker(needle) {
            return name_contains(needle, provider);
        }
        let remaining = strip_urgency_markers(needle);
        remaining.is_empty()
            || provider
                .searchable_names()
                .any(|name| fold_hebrew(name).contains(&remaining))
    }

    fn city_matches(&self, city: &str, provider: &Provider) -> bool {
        let wanted = english_city(city);
        provider
            .city_names()
            .any(|name| overlaps(&wanted, &english_city(name)))
    }

    fn service_matches(&self, query: &Query, provider: &Provider) -> bool {
        let terms = service_terms(query);
        terms.is_empty() || service_coverage(&terms, provider) > 0.0
    }

    fn is_urgent(&self, query: &Query) -> bool {
        query.urgent
            || query.name_filter.as_deref().is_some_and(has_urgency_marker)
            || query.service_query.iter().any(|term| has_urgency_marker(term))
    }

    fn score(&self, query: &Query, candidate: &Candidate<'_>) -> FactorScores {
        let provider = candidate.provider;
        let urgent = self.is_urgent(query);

        let terms = service_terms(query);
        let service = if terms.is_empty() {
            0.5
        } else {
            service_coverage(&terms, provider)
        };

        let location = if query.city.is_some() {
            1.0
        } else if query.location.is_none() {
            0.5
        } else {
            candidate.distance_km.map_or(0.3, distance_tier)
        };

        let reviews = f64::from(provider.review_count);
        let rating = ((provider.rating - 3.0) / 2.0) * 0.7 + (reviews / 100.0).min(1.0) * 0.3;
        let availability = if urgent { 1.0 } else { candidate.availability_ratio };
        let breadth = (provider.specializations.len() as f64 / 10.0).min(1.0);
        let experience = (breadth + (reviews / 200.0).min(1.0)) / 2.0;

        FactorScores {
            service: (
                service,
                grade(
                    service,
                    "מתאימה במיוחד לשירות המבוקש | excellent service fit",
                    "התאמה טובה לשירות | good service fit",
                    "התאמה חלקית | partial service fit",
                ),
            ),
            location: (
                location,
                grade(
                    location,
                    "מיקום קרוב מאוד | very close",
                    "מיקום סביר | reasonable distance",
                    "מרחק גדול יחסית | relatively far",
                ),
            ),
            rating: (
                rating,
                format!(
                    "דירוג {:.1} כוכבים ({} ביקורות) | {:.1} stars ({} reviews)",
                    provider.rating, provider.review_count, provider.rating, provider.review_count
                ),
            ),
            availability: (
                availability,
                if urgent {
                    "זמינות מיידית לבקשה דחופה | available for urgent request".to_string()
                } else {
                    "זמינות מתאימה | availability fits".to_string()
                },
            ),
            experience: (
                experience,
                if experience > 0.7 {
                    "ניסיון רב | highly experienced".to_string()
                } else {
                    "ניסיון סביר | reasonable experience".to_string()
                },
            ),
        }
    }

    fn urgency_bonus(&self, _query: &Query, _base: f64) -> Option<UrgencyBonus> {
        Some(UrgencyBonus {
            value: HEBREW_NLP_URGENCY_BONUS,
            explanation: "בקשה דחופה | urgent request".into(),
        })
    }

    fn explain(&self, _query: &Query, candidate: &Candidate<'_>, breakdown: &ScoreBreakdown) -> String {
        let mut reasons = Vec::new();
        if breakdown.service.score > 0.8 {
            reasons.push("התאמה מצוינת לשירות המבוקש | excellent service match");
        }
        if breakdown.location.score > 0.8 {
            reasons.push("קרובה למיקום המבוקש | close to requested location");
        }
        if breakdown.rating.score > 0.8 {
            reasons.push("דירוג גבוה במיוחד | very highly rated");
        }
        if breakdown.urgency_bonus.is_some() {
            reasons.push("זמינה לבקשה דחופה | available for urgent request");
        }
        if reasons.is_empty() {
            reasons.push("התאמה כללית טובה | good overall match");
        }
        format!("{}; {}", matched_summary(&candidate.passed), reasons.join(", "))
    }
}

impl EngineAdapter for HebrewNlpEngine {
    fn name(&self) -> &'static str {
        ENGINE_HEBREW_NLP
    }

    fn match_query(&self, query: &Query, providers: &[Provider]) -> Result<MatchOutcome, EngineError> {
        run_pipeline(self, query, providers)
    }

    fn health(&self) -> EngineHealth {
        weights_health(HEBREW_NLP_WEIGHTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrections::ServiceTag;
    use crate::engines::fixtures::{HAIFA, provider};
    use crate::geo::Coordinates;

    fn catalog() -> Vec<Provider> {
        vec![
            provider("ta-1", "Tel Aviv", &[ServiceTag::WoundCare]),
            provider("ta-2", "Tel Aviv", &[ServiceTag::Medication]),
            provider("hf-1", "Haifa", &[ServiceTag::WoundCare]),
        ]
    }

    #[test]
    fn hebrew_city_maps_to_catalog_spelling() {
        let q = Query {
            city: Some("תל אביב".into()),
            ..Default::default()
        };
        let outcome = HebrewNlpEngine::new().match_query(&q, &catalog()).unwrap();
        assert_eq!(outcome.count, 2);
        assert!(outcome.results.iter().all(|r| r.city == "Tel Aviv"));
        assert!(outcome.results.iter().all(|r| r.score_breakdown.location.score == 1.0));
    }

    #[test]
    fn hebrew_keywords_expand_to_treatment_codes() {
        let codes = expand_term("פצעים");
        assert!(codes.contains("WOUND_CARE"));
        assert!(codes.contains("WOUND_TREATMENT"));

        let q = Query {
            service_query: vec!["פצעים".into()],
            ..Default::default()
        };
        let outcome = HebrewNlpEngine::new().match_query(&q, &catalog()).unwrap();
        let ids = outcome.results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert!(ids.contains(&"ta-1"));
        assert!(ids.contains(&"hf-1"));
        let wound = outcome.results.iter().find(|r| r.id == "ta-1").unwrap();
        assert_eq!(wound.score_breakdown.service.score, 1.0);
    }

    #[test]
    fn urgency_marker_in_text_triggers_bonus_without_filtering_names() {
        let q = Query {
            name_filter: Some("דחוף".into()),
            ..Default::default()
        };
        let engine = HebrewNlpEngine::new();
        assert!(engine.is_urgent(&q));
        let outcome = engine.match_query(&q, &catalog()).unwrap();
        assert_eq!(outcome.count, 3);
        let breakdown = &outcome.results[0].score_breakdown;
        assert_eq!(breakdown.availability.score, 1.0);
        assert_eq!(
            breakdown.urgency_bonus.as_ref().map(|b| b.value),
            Some(HEBREW_NLP_URGENCY_BONUS)
        );
    }

    #[test]
    fn marker_only_service_term_marks_urgency_without_filtering() {
        let q = Query {
            service_query: vec!["דחוף".into()],
            ..Default::default()
        };
        let engine = HebrewNlpEngine::new();
        assert!(engine.is_urgent(&q));
        let outcome = engine
            .match_query(&q, &[provider("ta-1", "Tel Aviv", &[ServiceTag::WoundCare])])
            .unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.results[0].score_breakdown.service.score, 0.5);
        assert!(outcome.results[0].score_breakdown.urgency_bonus.is_some());
    }

    #[test]
    fn urgency_marker_is_stripped_from_service_terms() {
        let q = Query {
            service_query: vec!["urgent stoma".into()],
            ..Default::default()
        };
        let mut stoma = provider("st-1", "Haifa", &[ServiceTag::Stoma]);
        stoma.specializations = BTreeSet::from(["STOMA_TREATMENT".to_string()]);
        let outcome = HebrewNlpEngine::new()
            .match_query(&q, &[stoma, provider("ta-1", "Tel Aviv", &[ServiceTag::WoundCare])])
            .unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.results[0].id, "st-1");
    }

    #[test]
    fn bare_blood_keyword_reaches_blood_tests() {
        assert!(expand_term("דם").contains("BLOOD_TESTS"));
        assert!(expand_term("בדיקת דם").contains("BLOOD_TESTS"));
    }

    #[test]
    fn distance_tiers_step_down() {
        assert_eq!(distance_tier(1.0), 1.0);
        assert_eq!(distance_tier(7.0), 0.8);
        assert_eq!(distance_tier(20.0), 0.6);
        assert_eq!(distance_tier(40.0), 0.4);
        assert_eq!(distance_tier(90.0), 0.2);
    }

    #[test]
    fn unknown_provider_location_scores_low_but_stays() {
        let mut unknown = provider("x", "Nowhere", &[ServiceTag::General]);
        unknown.coordinates = None;
        let q = Query {
            location: Some(Coordinates::new(32.0, 34.8)),
            radius_km: Some(10.0),
            ..Default::default()
        };
        let outcome = HebrewNlpEngine::new().match_query(&q, &[unknown]).unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.results[0].score_breakdown.location.score, 0.3);
    }

    #[test]
    fn reason_is_bilingual_and_lists_filters() {
        let q = Query {
            location: Some(HAIFA),
            ..Default::default()
        };
        let outcome = HebrewNlpEngine::new().match_query(&q, &catalog()).unwrap();
        let top = &outcome.results[0];
        assert_eq!(top.id, "hf-1");
        assert!(top.reason.starts_with("matched: no filters requested; "));
        assert!(top.reason.contains("close to requested location"));
    }
}
