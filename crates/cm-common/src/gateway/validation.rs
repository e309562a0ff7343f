use std::fmt;

use serde::Serialize;

use crate::api::MatchRequest;
use crate::corrections::{correct_gender, correct_mobility};
use crate::date::{RequestWindow, parse_timestamp};
use crate::geo::Coordinates;
use crate::matching::{DEFAULT_TOP_K, Query};

pub const MAX_TEXT_LEN: usize = 200;
pub const MAX_QUERY_TERMS: usize = 20;
pub const MAX_RADIUS_KM: f64 = 500.0;

/// Values meaning "no preference" for the enum filters.
const ANY_VALUES: &[&str] = &["any", "all", "הכל"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every problem found in one request, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(|e| e.field).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let details = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "invalid request ({details})")
    }
}

impl std::error::Error for ValidationErrors {}

fn text(field: &'static str, value: Option<String>, errors: &mut ValidationErrors) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        errors.push(field, format!("must be at most {MAX_TEXT_LEN} characters"));
        return None;
    }
    Some(trimmed)
}

fn terms(field: &'static str, values: Vec<String>, errors: &mut ValidationErrors) -> Vec<String> {
    let cleaned = values
        .into_iter()
        .filter_map(|value| text(field, Some(value), errors))
        .collect::<Vec<_>>();
    if cleaned.len() > MAX_QUERY_TERMS {
        errors.push(field, format!("at most {MAX_QUERY_TERMS} terms allowed"));
    }
    cleaned
}

fn is_any(value: &str) -> bool {
    ANY_VALUES.iter().any(|any| value.eq_ignore_ascii_case(any))
}

/// Check a raw request and build the engine query from it.
///
/// Nothing is clamped silently: out-of-range values are reported, and every
/// failing field is reported, not just the first.
pub fn validate(request: MatchRequest, max_top_k: usize) -> Result<Query, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let top_k = match request.top_k {
        None => DEFAULT_TOP_K.min(max_top_k),
        Some(k) if k >= 1 && (k as u64) <= max_top_k as u64 => k as usize,
        Some(_) => {
            errors.push("topK", format!("must be between 1 and {max_top_k}"));
            0
        }
    };

    let name_filter = text("nurseName", request.nurse_name, &mut errors);
    let city = text("city", request.city, &mut errors);

    let mut raw_services = request.services_query;
    raw_services.extend(request.service);
    let service_query = terms("servicesQuery", raw_services, &mut errors);
    let expertise_query = terms("expertiseQuery", request.expertise_query, &mut errors);

    let mobility = match text("mobility", request.mobility, &mut errors) {
        Some(raw) if !is_any(&raw) => {
            let parsed = correct_mobility(&raw);
            if parsed.is_none() {
                errors.push("mobility", format!("unknown mobility {raw:?}"));
            }
            parsed
        }
        _ => None,
    };
    let gender = match text("gender", request.gender, &mut errors) {
        Some(raw) if !is_any(&raw) => {
            let parsed = correct_gender(&raw);
            if parsed.is_none() {
                errors.push("gender", format!("unknown gender {raw:?}"));
            }
            parsed
        }
        _ => None,
    };

    let window = match (text("start", request.start, &mut errors), text("end", request.end, &mut errors)) {
        (None, None) => None,
        (Some(_), None) => {
            errors.push("end", "required when start is given");
            None
        }
        (None, Some(_)) => {
            errors.push("start", "required when end is given");
            None
        }
        (Some(start), Some(end)) => {
            let start = parse_timestamp(&start).map_err(|err| errors.push("start", err.to_string()));
            let end = parse_timestamp(&end).map_err(|err| errors.push("end", err.to_string()));
            match (start, end) {
                (Ok(start), Ok(end)) => RequestWindow::new(start, end)
                    .map_err(|err| errors.push("end", err.to_string()))
                    .ok(),
                _ => None,
            }
        }
    };

    let location = match (request.lat, request.lng) {
        (None, None) => None,
        (Some(_), None) => {
            errors.push("lng", "required when lat is given");
            None
        }
        (None, Some(_)) => {
            errors.push("lat", "required when lng is given");
            None
        }
        (Some(lat), Some(lng)) => {
            if !(lat.is_finite() && (-90.0..=90.0).contains(&lat)) {
                errors.push("lat", "must be between -90 and 90");
            }
            if !(lng.is_finite() && (-180.0..=180.0).contains(&lng)) {
                errors.push("lng", "must be between -180 and 180");
            }
            Some(Coordinates::new(lat, lng)).filter(Coordinates::is_valid)
        }
    };

    let radius_km = match request.radius_km {
        Some(radius) if !(radius.is_finite() && radius > 0.0 && radius <= MAX_RADIUS_KM) => {
            errors.push("radiusKm", format!("must be greater than 0 and at most {MAX_RADIUS_KM}"));
            None
        }
        other => other,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Query {
        name_filter,
        city,
        service_query,
        expertise_query,
        mobility,
        gender,
        urgent: request.urgent.unwrap_or(false),
        window,
        location,
        radius_km,
        top_k,
    })
}
