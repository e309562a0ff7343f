use crate::corrections::{Gender, Mobility};
use crate::date::RequestWindow;
use crate::geo::Coordinates;

pub const DEFAULT_TOP_K: usize = 5;
/// Hard cap; larger requests are rejected at validation, never clamped.
pub const MAX_TOP_K: usize = 50;

/// A validated match request. Built by the gateway from the wire DTO.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub name_filter: Option<String>,
    pub city: Option<String>,
    pub service_query: Vec<String>,
    pub expertise_query: Vec<String>,
    pub mobility: Option<Mobility>,
    pub gender: Option<Gender>,
    pub urgent: bool,
    pub window: Option<RequestWindow>,
    pub location: Option<Coordinates>,
    pub radius_km: Option<f64>,
    pub top_k: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            name_filter: None,
            city: None,
            service_query: Vec::new(),
            expertise_query: Vec::new(),
            mobility: None,
            gender: None,
            urgent: false,
            window: None,
            location: None,
            radius_km: None,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Query {
    pub fn has_service_query(&self) -> bool {
        !self.service_query.is_empty()
    }
}
