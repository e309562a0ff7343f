pub mod cities;

use serde::{Deserialize, Serialize};

pub use cities::{CityResolution, CityTable, CityTableError, DEFAULT_CENTROID};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle (haversine) distance in kilometres.
///
/// Returns `None` when either side is missing or not a valid coordinate;
/// never panics.
pub fn distance_km(from: Option<Coordinates>, to: Option<Coordinates>) -> Option<f64> {
    let (from, to) = (from?, to?);
    if !from.is_valid() || !to.is_valid() {
        return None;
    }
    if from == to {
        return Some(0.0);
    }

    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    Some(EARTH_RADIUS_KM * c)
}
