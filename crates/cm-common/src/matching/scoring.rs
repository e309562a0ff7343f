use serde::Serialize;

use super::weights::Weights;
use crate::corrections::ServiceTag;

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// One factor's contribution: raw score in `[0, 1]`, its weight, and the product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScore {
    pub weight: f64,
    pub score: f64,
    pub weighted: f64,
    pub explanation: String,
}

impl FactorScore {
    pub fn new(weight: f64, score: f64, explanation: impl Into<String>) -> Self {
        let score = clamp_unit(score);
        Self {
            weight,
            score,
            weighted: weight * score,
            explanation: explanation.into(),
        }
    }
}

/// Unweighted factor scores plus their explanations, as produced by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorScores {
    pub service: (f64, String),
    pub location: (f64, String),
    pub rating: (f64, String),
    pub availability: (f64, String),
    pub experience: (f64, String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgencyBonus {
    pub value: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub service: FactorScore,
    pub location: FactorScore,
    pub rating: FactorScore,
    pub availability: FactorScore,
    pub experience: FactorScore,
    /// Weighted sum of the five factors.
    pub base: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency_bonus: Option<UrgencyBonus>,
    pub total: f64,
    pub formula: String,
}

impl ScoreBreakdown {
    pub fn compose(weights: &Weights, factors: FactorScores) -> Self {
        let service = FactorScore::new(weights.service, factors.service.0, factors.service.1);
        let location = FactorScore::new(weights.location, factors.location.0, factors.location.1);
        let rating = FactorScore::new(weights.rating, factors.rating.0, factors.rating.1);
        let availability = FactorScore::new(
            weights.availability,
            factors.availability.0,
            factors.availability.1,
        );
        let experience =
            FactorScore::new(weights.experience, factors.experience.0, factors.experience.1);

        let base = service.weighted
            + location.weighted
            + rating.weighted
            + availability.weighted
            + experience.weighted;

        let mut breakdown = Self {
            service,
            location,
            rating,
            availability,
            experience,
            base,
            urgency_bonus: None,
            total: base,
            formula: String::new(),
        };
        breakdown.formula = breakdown.render_formula();
        breakdown
    }

    pub fn with_urgency_bonus(mut self, bonus: Option<UrgencyBonus>) -> Self {
        self.total = self.base + bonus.as_ref().map_or(0.0, |b| b.value);
        self.urgency_bonus = bonus;
        self.formula = self.render_formula();
        self
    }

    fn factors(&self) -> [&FactorScore; 5] {
        [
            &self.service,
            &self.location,
            &self.rating,
            &self.availability,
            &self.experience,
        ]
    }

    fn render_formula(&self) -> String {
        let terms = self
            .factors()
            .iter()
            .map(|f| format!("({:.2} × {:.2})", f.weight, f.score))
            .collect::<Vec<_>>()
            .join(" + ");
        match &self.urgency_bonus {
            Some(bonus) => format!("{terms} + urgent {:.3} = {:.3}", bonus.value, self.total),
            None => format!("{terms} = {:.3}", self.total),
        }
    }
}

/// One ranked entry in a match response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub id: String,
    pub name: String,
    pub city: String,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub reason: String,
    pub distance_km: Option<f64>,
    pub availability_ratio: f64,
    pub rating: f64,
    pub review_count: u32,
    pub service_tags: Vec<ServiceTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub count: usize,
    pub results: Vec<MatchResult>,
    /// Candidates left after filtering, before the top-K cut.
    #[serde(skip)]
    pub candidates: usize,
}
