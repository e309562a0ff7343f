use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::Provider;
use crate::geo::CityTable;
use crate::ingest::{load_csv_path, read_snapshot, write_snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOrigin {
    Csv,
    Snapshot,
    Inline,
    Empty,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogSources {
    pub data_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
}

/// The provider collection every match runs against.
///
/// Built once at startup and never mutated; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    providers: Vec<Provider>,
    origin: CatalogOrigin,
}

impl ProviderCatalog {
    pub fn new(mut providers: Vec<Provider>) -> Self {
        providers.sort_by(|a, b| a.id.cmp(&b.id));
        let origin = if providers.is_empty() {
            CatalogOrigin::Empty
        } else {
            CatalogOrigin::Inline
        };
        Self { providers, origin }
    }

    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
            origin: CatalogOrigin::Empty,
        }
    }

    /// CSV first. On failure, fall back to the last snapshot, then to an
    /// empty collection. Never fails: the service must start either way.
    pub fn load(sources: &CatalogSources, cities: &CityTable) -> Self {
        if let Some(path) = &sources.data_path {
            match load_csv_path(path, cities) {
                Ok(report) => {
                    info!(
                        path = %path.display(),
                        providers = report.providers.len(),
                        skipped = report.rows_skipped_missing_id,
                        malformed = report.rows_malformed,
                        city_fallbacks = report.city_fallbacks,
                        "provider_catalog_loaded"
                    );
                    if let Some(snapshot) = &sources.snapshot_path {
                        if let Err(err) = write_snapshot(snapshot, &report.providers) {
                            warn!(path = %snapshot.display(), error = %err, "provider_snapshot_write_failed");
                        }
                    }
                    return Self {
                        providers: report.providers,
                        origin: CatalogOrigin::Csv,
                    };
                }
                Err(err) => {
                    error!(path = %path.display(), error = %err, "provider_ingest_failed");
                }
            }
        }

        if let Some(path) = &sources.snapshot_path {
            match read_snapshot(path) {
                Ok(providers) => {
                    warn!(
                        path = %path.display(),
                        providers = providers.len(),
                        "provider_catalog_from_snapshot"
                    );
                    let mut catalog = Self::new(providers);
                    catalog.origin = CatalogOrigin::Snapshot;
                    return catalog;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "provider_snapshot_unavailable");
                }
            }
        }

        warn!("provider_catalog_empty");
        Self::empty()
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn origin(&self) -> CatalogOrigin {
        self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cm-catalog-{}-{name}", std::process::id()))
    }

    #[test]
    fn loads_csv_and_writes_snapshot() {
        let data = temp_path("ok.csv");
        let snapshot = temp_path("ok.json");
        std::fs::write(&data, "nurse_id,municipality\nn1,Haifa\n").unwrap();

        let sources = CatalogSources {
            data_path: Some(data.clone()),
            snapshot_path: Some(snapshot.clone()),
        };
        let catalog = ProviderCatalog::load(&sources, &CityTable::builtin());
        assert_eq!(catalog.origin(), CatalogOrigin::Csv);
        assert_eq!(catalog.len(), 1);
        assert!(snapshot.exists());

        let _ = std::fs::remove_file(data);
        let _ = std::fs::remove_file(snapshot);
    }

    #[test]
    fn falls_back_to_snapshot_when_csv_is_unusable() {
        let data = temp_path("bad.csv");
        let snapshot = temp_path("bad.json");
        std::fs::write(&data, "no_id_column\nvalue\n").unwrap();
        let provider = Provider {
            id: "cached".into(),
            ..Default::default()
        };
        write_snapshot(&snapshot, &[provider]).unwrap();

        let sources = CatalogSources {
            data_path: Some(data.clone()),
            snapshot_path: Some(snapshot.clone()),
        };
        let catalog = ProviderCatalog::load(&sources, &CityTable::builtin());
        assert_eq!(catalog.origin(), CatalogOrigin::Snapshot);
        let restored = &catalog.providers()[0];
        assert_eq!(restored.id, "cached");
        assert!((3.5..=5.0).contains(&restored.rating));
        assert!(!restored.service_tags.is_empty());

        let _ = std::fs::remove_file(data);
        let _ = std::fs::remove_file(snapshot);
    }

    #[test]
    fn falls_back_to_empty_without_any_source() {
        let sources = CatalogSources {
            data_path: Some(temp_path("missing.csv")),
            snapshot_path: None,
        };
        let catalog = ProviderCatalog::load(&sources, &CityTable::builtin());
        assert_eq!(catalog.origin(), CatalogOrigin::Empty);
        assert!(catalog.is_empty());
    }
}
