use serde::Serialize;

/// Operator-chosen factor weights. Reported verbatim in every score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    pub service: f64,
    pub location: f64,
    pub rating: f64,
    pub availability: f64,
    pub experience: f64,
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.service + self.location + self.rating + self.availability + self.experience
    }

    /// All weights non-negative and summing to at most one.
    pub fn is_valid(&self) -> bool {
        let all = [
            self.service,
            self.location,
            self.rating,
            self.availability,
            self.experience,
        ];
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && self.sum() <= 1.0 + 1e-9
    }
}
