use serde::Serialize;
use strum::AsRefStr;

use super::pipeline::MatchHeuristics;
use super::query::Query;
use crate::Provider;
use crate::date::availability_overlap_ratio;
use crate::geo::distance_km;
use crate::normalize::normalize_token;

/// Filters in the order they run. Cheap string checks come first so the
/// overlap and distance computations only run for survivors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterStage {
    Name,
    City,
    Service,
    Mobility,
    Gender,
    Availability,
    Radius,
}

/// A provider that survived every requested filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub provider: &'a Provider,
    /// Requested filters this provider passed, in evaluation order.
    pub passed: Vec<FilterStage>,
    pub availability_ratio: f64,
    pub distance_km: Option<f64>,
}

/// Case-insensitive substring match against display name and aliases.
pub fn name_contains(needle: &str, provider: &Provider) -> bool {
    let needle = normalize_token(needle);
    if needle.is_empty() {
        return true;
    }
    provider
        .searchable_names()
        .any(|name| normalize_token(name).contains(&needle))
}

/// Substring match in either direction between two normalized strings.
pub fn overlaps(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

/// Run the filter chain. `None` means the provider was filtered out.
pub fn evaluate<'a, H>(heuristics: &H, query: &Query, provider: &'a Provider) -> Option<Candidate<'a>>
where
    H: MatchHeuristics + ?Sized,
{
    let mut passed = Vec::new();

    if let Some(name) = query.name_filter.as_deref() {
        if !heuristics.name_matches(name, provider) {
            return None;
        }
        passed.push(FilterStage::Name);
    }

    if let Some(city) = query.city.as_deref() {
        if !heuristics.city_matches(city, provider) {
            return None;
        }
        passed.push(FilterStage::City);
    }

    if query.has_service_query() {
        if !heuristics.service_matches(query, provider) {
            return None;
        }
        passed.push(FilterStage::Service);
    }

    if let Some(mobility) = query.mobility {
        if provider.mobility != Some(mobility) {
            return None;
        }
        passed.push(FilterStage::Mobility);
    }

    if let Some(gender) = query.gender {
        if provider.gender != Some(gender) {
            return None;
        }
        passed.push(FilterStage::Gender);
    }

    let availability_ratio = availability_overlap_ratio(query.window.as_ref(), &provider.availability);
    if query.window.is_some() {
        if availability_ratio <= 0.0 {
            return None;
        }
        passed.push(FilterStage::Availability);
    }

    let distance_km = distance_km(query.location, provider.coordinates);
    if let Some(distance) = distance_km {
        if let Some(radius) = query.radius_km.or(heuristics.default_radius_km()) {
            if distance > radius {
                return None;
            }
            passed.push(FilterStage::Radius);
        }
    }

    Some(Candidate {
        provider,
        passed,
        availability_ratio,
        distance_km,
    })
}
