use std::fs;
use std::path::Path;

use tracing::warn;

use super::IngestError;
use crate::Provider;
use crate::corrections::ServiceTag;
use crate::normalize::clamp_rating;

/// Persist normalized providers as JSON. Writes to a sibling temp file and
/// renames it into place so readers never see a partial snapshot.
pub fn write_snapshot(path: &Path, providers: &[Provider]) -> Result<(), IngestError> {
    let body = serde_json::to_vec_pretty(providers)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a snapshot, re-applying the record invariants ingestion guarantees:
/// ratings inside the valid range, at least one service tag, a non-empty id.
/// Records without an id are dropped and counted.
pub fn read_snapshot(path: &Path) -> Result<Vec<Provider>, IngestError> {
    let raw = fs::read(path)?;
    let stored: Vec<Provider> = serde_json::from_slice(&raw)?;
    let (providers, dropped) = restore_records(stored);
    if dropped > 0 {
        warn!(path = %path.display(), dropped, "snapshot_records_dropped_missing_id");
    }
    Ok(providers)
}

fn restore_records(stored: Vec<Provider>) -> (Vec<Provider>, usize) {
    let total = stored.len();
    let providers = stored
        .into_iter()
        .filter(|provider| !provider.id.trim().is_empty())
        .map(|mut provider| {
            provider.rating = clamp_rating(provider.rating);
            if provider.service_tags.is_empty() {
                provider.service_tags.insert(ServiceTag::General);
            }
            provider
        })
        .collect::<Vec<_>>();
    let dropped = total - providers.len();
    (providers, dropped)
}
