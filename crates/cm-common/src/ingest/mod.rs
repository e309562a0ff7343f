//! Record Normalizer: raw tabular rows -> canonical [`Provider`] records.
//!
//! Ingestion is best-effort. Individual bad rows are skipped and counted in
//! the [`IngestReport`]; only input that cannot be read as a table at all is
//! an [`IngestError`].

pub mod normalizer;
pub mod snapshot;
pub mod tabular;

use serde::Deserialize;
use thiserror::Error;

use crate::Provider;

pub use normalizer::normalize_rows;
pub use snapshot::{read_snapshot, write_snapshot};
pub use tabular::{load_csv_path, read_csv};

/// One row of the provider export. A provider usually spans several rows
/// (one per treatment type / availability slot).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub nurse_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Alternate service label (usually a treatment code).
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mobility: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    /// Primary service label.
    #[serde(default)]
    pub treatment_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_active: Option<String>,
    #[serde(default, alias = "is_approved[nurse_nurse]")]
    pub is_approved: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub from_datetime_utc: Option<String>,
    #[serde(default)]
    pub to_datetime_utc: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default, alias = "reviewsCount")]
    pub reviews_count: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Sorted by id.
    pub providers: Vec<Provider>,
    pub rows_read: usize,
    pub rows_skipped_missing_id: usize,
    pub rows_malformed: usize,
    pub invalid_windows: usize,
    /// Providers whose city was unknown and got the default centroid.
    pub city_fallbacks: usize,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open provider source: {0}")]
    Io(#[from] std::io::Error),
    #[error("provider source is not readable as CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("provider source has no {0:?} column")]
    MissingColumn(&'static str),
    #[error("provider snapshot is invalid: {0}")]
    Snapshot(#[from] serde_json::Error),
}
