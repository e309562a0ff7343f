pub mod api;
pub mod catalog;
pub mod corrections;
pub mod date;
pub mod engines;
pub mod gateway;
pub mod geo;
pub mod ingest;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod registry;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use corrections::profile::{Gender, Mobility};
use corrections::service_tags::ServiceTag;
use date::availability::AvailabilityWindow;
use geo::Coordinates;

/// Where a provider's rating came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSource {
    /// Supplied by the source data (clamped into the valid range).
    Sourced,
    /// Seeded from a stable hash of the provider id.
    #[default]
    Derived,
}

/// Canonical care provider record produced by ingestion.
///
/// Records are built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub city: String,
    #[serde(default)]
    pub municipalities: Vec<String>,
    pub coordinates: Option<Coordinates>,
    pub service_tags: BTreeSet<ServiceTag>,
    #[serde(default)]
    pub specializations: BTreeSet<String>,
    #[serde(default)]
    pub expertise_tags: BTreeSet<String>,
    pub mobility: Option<Mobility>,
    pub gender: Option<Gender>,
    pub rating: f64,
    pub review_count: u32,
    #[serde(default)]
    pub rating_source: RatingSource,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
    pub active: bool,
    pub approved: bool,
}

impl Provider {
    /// Inactive or unapproved records never reach the filter stage.
    pub fn is_matchable(&self) -> bool {
        self.active && self.approved
    }

    /// City names usable for matching: the primary city first, then every
    /// other municipality seen during ingestion.
    pub fn city_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.city.as_str())
            .chain(
                self.municipalities
                    .iter()
                    .map(String::as_str)
                    .filter(move |name| *name != self.city),
            )
            .filter(|name| !name.is_empty())
    }

    /// Display name followed by aliases.
    pub fn searchable_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.display_name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|name| !name.is_empty())
    }
}
