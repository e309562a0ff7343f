use serde::{Deserialize, Serialize};

/// Inbound `/match` body. Everything is optional and loosely typed here;
/// the gateway validates it into a [`crate::matching::Query`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    /// City name, Hebrew or English.
    #[serde(default)]
    pub city: Option<String>,
    /// Substring of the provider's display name or aliases.
    #[serde(default)]
    pub nurse_name: Option<String>,
    /// Free-text service terms, e.g. `["Wound Care"]`.
    #[serde(default)]
    pub services_query: Vec<String>,
    /// Single service term accepted by older clients; merged into `servicesQuery`.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub expertise_query: Vec<String>,
    #[serde(default)]
    pub mobility: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub urgent: Option<bool>,
    /// ISO-8601 start of the requested window.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub radius_km: Option<f64>,
    /// Signed so negative values reach validation instead of failing to parse.
    #[serde(default)]
    pub top_k: Option<i64>,
    /// Engine name; `?engine=` on the URL takes precedence.
    #[serde(default)]
    pub engine: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_body() {
        let raw = r#"{"city":"Tel Aviv","servicesQuery":["Wound Care"],"topK":3,"radiusKm":10.5,"nurseName":"dana"}"#;
        let request: MatchRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.city.as_deref(), Some("Tel Aviv"));
        assert_eq!(request.services_query, vec!["Wound Care"]);
        assert_eq!(request.top_k, Some(3));
        assert_eq!(request.radius_km, Some(10.5));
        assert_eq!(request.nurse_name.as_deref(), Some("dana"));
    }

    #[test]
    fn empty_body_is_all_defaults() {
        let request: MatchRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, MatchRequest::default());
    }
}
