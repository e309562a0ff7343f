use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use super::{IngestError, IngestReport, RawRow, normalize_rows};
use crate::geo::CityTable;

const ID_COLUMN: &str = "nurse_id";

/// Read a CSV export with headers and normalize it.
///
/// Rows that fail to decode are skipped and counted in `rows_malformed`.
/// Fails only when the header itself is unreadable or lacks `nurse_id`.
pub fn read_csv<R: Read>(reader: R, cities: &CityTable) -> Result<IngestReport, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if !headers.iter().any(|header| header == ID_COLUMN) {
        return Err(IngestError::MissingColumn(ID_COLUMN));
    }

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    for (index, record) in csv_reader.deserialize::<RawRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(err) => {
                malformed += 1;
                debug!(row = index + 2, error = %err, "csv_row_malformed");
            }
        }
    }

    if malformed > 0 {
        warn!(count = malformed, "ingest_rows_malformed");
    }

    let mut report = normalize_rows(rows, cities);
    report.rows_read += malformed;
    report.rows_malformed = malformed;
    Ok(report)
}

pub fn load_csv_path(path: &Path, cities: &CityTable) -> Result<IngestReport, IngestError> {
    let file = File::open(path)?;
    read_csv(file, cities)
}
