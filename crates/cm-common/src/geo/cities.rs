use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use super::Coordinates;
use crate::normalize::normalize_token;

/// Used for any city missing from the table (roughly the centre of the country).
pub const DEFAULT_CENTROID: Coordinates = Coordinates::new(31.4118, 35.0818);

// English spellings seen in the source data plus their Hebrew names.
const BUILTIN_CITIES: &[(&str, f64, f64)] = &[
    ("Tel Aviv", 32.0853, 34.7818),
    ("Tel Aviv-Yafo", 32.0853, 34.7818),
    ("תל אביב", 32.0853, 34.7818),
    ("תל אביב-יפו", 32.0853, 34.7818),
    ("Jerusalem", 31.7683, 35.2137),
    ("ירושלים", 31.7683, 35.2137),
    ("Haifa", 32.7940, 34.9896),
    ("חיפה", 32.7940, 34.9896),
    ("Nethanya", 32.3215, 34.8532),
    ("Netanya", 32.3215, 34.8532),
    ("נתניה", 32.3215, 34.8532),
    ("Herzliya", 32.1624, 34.8447),
    ("הרצליה", 32.1624, 34.8447),
    ("Petach Tikva", 32.0871, 34.8869),
    ("Petah Tikva", 32.0871, 34.8869),
    ("פתח תקווה", 32.0871, 34.8869),
    ("Rishon LeTsiyon", 31.9730, 34.7925),
    ("Rishon LeZion", 31.9730, 34.7925),
    ("ראשון לציון", 31.9730, 34.7925),
    ("Ramat-Gan", 32.0700, 34.8235),
    ("רמת גן", 32.0700, 34.8235),
    ("Bat-Yam", 32.0231, 34.7503),
    ("בת ים", 32.0231, 34.7503),
    ("Hadera", 32.4340, 34.9196),
    ("חדרה", 32.4340, 34.9196),
    ("Ashdod", 31.8044, 34.6553),
    ("אשדוד", 31.8044, 34.6553),
    ("Ashkelon", 31.6688, 34.5743),
    ("אשקלון", 31.6688, 34.5743),
    ("Beer Sheva", 31.2530, 34.7915),
    ("Be'er Sheva", 31.2530, 34.7915),
    ("באר שבע", 31.2530, 34.7915),
    ("Rehovoth", 31.8928, 34.8113),
    ("Rehovot", 31.8928, 34.8113),
    ("רחובות", 31.8928, 34.8113),
    ("Kfar Sava", 32.1858, 34.9077),
    ("Kfar Saba", 32.1858, 34.9077),
    ("כפר סבא", 32.1858, 34.9077),
    ("Givatayim", 32.0719, 34.8097),
    ("גבעתיים", 32.0719, 34.8097),
    ("Holon", 32.0167, 34.7667),
    ("חולון", 32.0167, 34.7667),
];

#[derive(Debug, Error)]
pub enum CityTableError {
    #[error("failed to read city table: {0}")]
    Io(#[from] std::io::Error),
    #[error("city table is not a name -> {{lat, lng}} object: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("city table entry {0:?} has out-of-range coordinates")]
    InvalidEntry(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CityResolution {
    pub coordinates: Coordinates,
    /// True when the city was unknown and [`DEFAULT_CENTROID`] was used.
    pub fallback: bool,
}

/// City name -> coordinates lookup. Exact match first, then case and
/// separator-insensitive match.
#[derive(Debug, Clone, Default)]
pub struct CityTable {
    exact: HashMap<String, Coordinates>,
    folded: HashMap<String, Coordinates>,
}

impl CityTable {
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for (name, lat, lng) in BUILTIN_CITIES {
            table.insert(name, Coordinates::new(*lat, *lng));
        }
        table
    }

    pub fn insert(&mut self, name: &str, coordinates: Coordinates) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.exact.insert(name.to_string(), coordinates);
        self.folded.insert(normalize_token(name), coordinates);
    }

    /// Parse `{"Tel Aviv": {"lat": 32.08, "lng": 34.78}, ...}`.
    pub fn from_json_str(raw: &str) -> Result<Self, CityTableError> {
        let entries: HashMap<String, Coordinates> = serde_json::from_str(raw)?;
        let mut table = Self::default();
        let mut names = entries.into_iter().collect::<Vec<_>>();
        names.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, coordinates) in names {
            if !coordinates.is_valid() {
                return Err(CityTableError::InvalidEntry(name));
            }
            table.insert(&name, coordinates);
        }
        Ok(table)
    }

    pub fn load_json(path: &Path) -> Result<Self, CityTableError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Entries from `other` win over existing ones.
    pub fn merge(mut self, other: CityTable) -> Self {
        self.exact.extend(other.exact);
        self.folded.extend(other.folded);
        self
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn lookup(&self, city: &str) -> Option<Coordinates> {
        let city = city.trim();
        if city.is_empty() {
            return None;
        }
        self.exact
            .get(city)
            .or_else(|| self.folded.get(&normalize_token(city)))
            .copied()
    }

    pub fn resolve(&self, city: &str) -> CityResolution {
        match self.lookup(city) {
            Some(coordinates) => CityResolution {
                coordinates,
                fallback: false,
            },
            None => CityResolution {
                coordinates: DEFAULT_CENTROID,
                fallback: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_and_separator_insensitive() {
        let table = CityTable::builtin();
        let tel_aviv = table.lookup("Tel Aviv").unwrap();
        assert_eq!(table.lookup("tel aviv"), Some(tel_aviv));
        assert_eq!(table.lookup("TEL-AVIV"), Some(tel_aviv));
        assert_eq!(table.lookup("ramat gan"), table.lookup("Ramat-Gan"));
        assert_eq!(table.lookup("חיפה"), table.lookup("Haifa"));
    }

    #[test]
    fn unknown_city_resolves_to_default_centroid() {
        let table = CityTable::builtin();
        let resolution = table.resolve("Atlantis");
        assert!(resolution.fallback);
        assert_eq!(resolution.coordinates, DEFAULT_CENTROID);

        let empty = table.resolve("   ");
        assert!(empty.fallback);
    }

    #[test]
    fn json_table_merges_over_builtin() {
        let custom = CityTable::from_json_str(
            r#"{"Atlantis": {"lat": 10.0, "lng": 20.0}, "Haifa": {"lat": 1.0, "lng": 2.0}}"#,
        )
        .unwrap();
        let table = CityTable::builtin().merge(custom);

        assert_eq!(table.lookup("atlantis"), Some(Coordinates::new(10.0, 20.0)));
        assert_eq!(table.lookup("Haifa"), Some(Coordinates::new(1.0, 2.0)));
        assert!(table.lookup("Holon").is_some());
    }

    #[test]
    fn json_table_rejects_bad_input() {
        assert!(matches!(
            CityTable::from_json_str("[1, 2]"),
            Err(CityTableError::Parse(_))
        ));
        assert!(matches!(
            CityTable::from_json_str(r#"{"Nowhere": {"lat": 123.0, "lng": 0.0}}"#),
            Err(CityTableError::InvalidEntry(name)) if name == "Nowhere"
        ));
    }
}
