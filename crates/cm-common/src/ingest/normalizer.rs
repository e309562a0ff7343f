use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use super::{IngestReport, RawRow};
use crate::corrections::{
    Gender, Mobility, ServiceTag, correct_gender, correct_mobility, extract_expertise,
    extract_service_tags,
};
use crate::date::{AvailabilityWindow, parse_timestamp};
use crate::geo::CityTable;
use crate::normalize::{clamp_rating, derive_rating, derive_review_count, parse_flag};
use crate::{Provider, RatingSource};

/// Everything collected for one provider id before it is finalized.
#[derive(Debug, Default)]
struct Draft {
    display_name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    municipalities: Vec<String>,
    service_tags: BTreeSet<ServiceTag>,
    specializations: BTreeSet<String>,
    expertise_tags: BTreeSet<String>,
    mobility: Option<Mobility>,
    gender: Option<Gender>,
    rating: Option<f64>,
    review_count: Option<u32>,
    availability: Vec<AvailabilityWindow>,
    active: bool,
    approved: bool,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Absent flags count as set; only an explicit falsy value disables a record.
fn flag_or_true(value: &Option<String>) -> bool {
    non_empty(value).is_none_or(parse_flag)
}

fn specialization_code(raw: &str) -> Option<String> {
    let code = raw
        .trim()
        .to_uppercase()
        .replace([' ', '-'], "_");
    (!code.is_empty()).then_some(code)
}

impl Draft {
    fn absorb(&mut self, row: &RawRow, invalid_windows: &mut usize) {
        keep_first(&mut self.display_name, non_empty(&row.display_name));
        keep_first(&mut self.first_name, non_empty(&row.first_name));
        keep_first(&mut self.last_name, non_empty(&row.last_name));

        if let Some(city) = non_empty(&row.municipality) {
            if !self.municipalities.iter().any(|known| known == city) {
                self.municipalities.push(city.to_string());
            }
        }

        let primary = non_empty(&row.treatment_type).unwrap_or("");
        let alternate = non_empty(&row.name).unwrap_or("");
        let remarks = non_empty(&row.remarks).unwrap_or("");
        self.service_tags
            .extend(extract_service_tags(primary, alternate, remarks));
        self.specializations
            .extend([primary, alternate].into_iter().filter_map(specialization_code));

        let mobility = non_empty(&row.mobility).and_then(correct_mobility);
        self.mobility = self.mobility.or(mobility);
        self.gender = self
            .gender
            .or_else(|| non_empty(&row.gender).and_then(correct_gender));
        self.expertise_tags.extend(extract_expertise(
            mobility,
            non_empty(&row.status).unwrap_or(""),
            remarks,
        ));

        if self.rating.is_none() {
            self.rating = non_empty(&row.rating)
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|rating| rating.is_finite());
        }
        if self.review_count.is_none() {
            self.review_count = non_empty(&row.reviews_count).and_then(|raw| raw.parse().ok());
        }

        match (non_empty(&row.from_datetime_utc), non_empty(&row.to_datetime_utc)) {
            (Some(from), Some(to)) => match (parse_timestamp(from), parse_timestamp(to)) {
                (Ok(from), Ok(to)) if to > from => self
                    .availability
                    .extend(AvailabilityWindow::split_interval(from, to)),
                _ => *invalid_windows += 1,
            },
            (None, None) => {}
            _ => *invalid_windows += 1,
        }

        self.active |= flag_or_true(&row.is_active);
        self.approved |= flag_or_true(&row.is_approved);
    }

    fn finish(self, id: String, cities: &CityTable, fallback_cities: &mut BTreeSet<String>) -> (Provider, bool) {
        let city = self.municipalities.first().cloned().unwrap_or_default();
        let resolution = cities.resolve(&city);
        if resolution.fallback {
            fallback_cities.insert(city.clone());
        }

        let full_name = match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        };
        let display_name = self
            .display_name
            .clone()
            .or_else(|| full_name.clone())
            .unwrap_or_else(|| format!("Nurse {}", id.chars().take(8).collect::<String>()));

        let mut aliases = Vec::new();
        for alias in [self.first_name, self.last_name, full_name].into_iter().flatten() {
            if alias != display_name && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }

        let mut service_tags = self.service_tags;
        if service_tags.is_empty() {
            service_tags.insert(ServiceTag::General);
        }

        let (rating, rating_source) = match self.rating {
            Some(rating) => (clamp_rating(rating), RatingSource::Sourced),
            None => (derive_rating(&id), RatingSource::Derived),
        };
        let review_count = self
            .review_count
            .unwrap_or_else(|| derive_review_count(&id));

        let mut availability = self.availability;
        availability.sort_by_key(AvailabilityWindow::sort_key);
        availability.dedup();

        let provider = Provider {
            display_name,
            aliases,
            city,
            municipalities: self.municipalities,
            coordinates: Some(resolution.coordinates),
            service_tags,
            specializations: self.specializations,
            expertise_tags: self.expertise_tags,
            mobility: self.mobility,
            gender: self.gender,
            rating,
            review_count,
            rating_source,
            availability,
            active: self.active,
            approved: self.approved,
            id,
        };
        (provider, resolution.fallback)
    }
}

fn keep_first(slot: &mut Option<String>, candidate: Option<&str>) {
    if slot.is_none() {
        *slot = candidate.map(str::to_string);
    }
}

/// Group rows by provider id and build canonical records.
///
/// Never fails: rows without an id are skipped and counted, unknown cities
/// fall back to the default centroid. Output is sorted by id, so the same
/// input always produces the same collection.
pub fn normalize_rows<I>(rows: I, cities: &CityTable) -> IngestReport
where
    I: IntoIterator<Item = RawRow>,
{
    let mut report = IngestReport::default();
    let mut drafts: BTreeMap<String, Draft> = BTreeMap::new();

    for row in rows {
        report.rows_read += 1;
        let Some(id) = non_empty(&row.nurse_id).map(str::to_string) else {
            report.rows_skipped_missing_id += 1;
            continue;
        };
        drafts
            .entry(id)
            .or_default()
            .absorb(&row, &mut report.invalid_windows);
    }

    let mut fallback_cities = BTreeSet::new();
    let mut city_fallbacks = 0;
    report.providers = drafts
        .into_iter()
        .map(|(id, draft)| {
            let (provider, fell_back) = draft.finish(id, cities, &mut fallback_cities);
            city_fallbacks += usize::from(fell_back);
            provider
        })
        .collect();
    report.city_fallbacks = city_fallbacks;

    if report.rows_skipped_missing_id > 0 {
        warn!(
            skipped = report.rows_skipped_missing_id,
            "ingest_rows_skipped_missing_id"
        );
    }
    if report.invalid_windows > 0 {
        warn!(count = report.invalid_windows, "ingest_invalid_availability_windows");
    }
    if report.city_fallbacks > 0 {
        warn!(
            providers = report.city_fallbacks,
            cities = ?fallback_cities,
            "centroid_default_used"
        );
    }
    info!(
        rows = report.rows_read,
        providers = report.providers.len(),
        "ingest_complete"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::DEFAULT_CENTROID;

    fn row(id: &str, city: &str, treatment: &str) -> RawRow {
        RawRow {
            nurse_id: Some(id.into()),
            municipality: Some(city.into()),
            treatment_type: Some(treatment.into()),
            is_active: Some("true".into()),
            is_approved: Some("true".into()),
            ..Default::default()
        }
    }

    #[test]
    fn groups_rows_by_id_and_merges_tags() {
        let rows = vec![
            row("n1", "Tel Aviv", "WOUND_TREATMENT"),
            row("n1", "Ramat-Gan", "MEDICATION_ARRANGEMENT"),
            row("n2", "Haifa", "STOMA_TREATMENT"),
        ];
        let report = normalize_rows(rows, &CityTable::builtin());

        assert_eq!(report.rows_read, 3);
        assert_eq!(report.providers.len(), 2);
        let n1 = &report.providers[0];
        assert_eq!(n1.id, "n1");
        assert_eq!(n1.city, "Tel Aviv");
        assert_eq!(n1.municipalities, vec!["Tel Aviv", "Ramat-Gan"]);
        assert!(n1.service_tags.contains(&ServiceTag::WoundCare));
        assert!(n1.service_tags.contains(&ServiceTag::Medication));
        assert!(n1.specializations.contains("WOUND_TREATMENT"));
    }

    #[test]
    fn rows_without_id_are_counted_not_fatal() {
        let mut orphan = row("", "Haifa", "STOMA_TREATMENT");
        orphan.nurse_id = None;
        let rows = vec![orphan, row("  ", "Haifa", ""), row("n1", "Haifa", "")];
        let report = normalize_rows(rows, &CityTable::builtin());

        assert_eq!(report.rows_skipped_missing_id, 2);
        assert_eq!(report.providers.len(), 1);
    }

    #[test]
    fn unrecognized_services_fall_back_to_general() {
        let report = normalize_rows(vec![row("n1", "Haifa", "SOMETHING_ELSE")], &CityTable::builtin());
        assert_eq!(
            report.providers[0].service_tags,
            BTreeSet::from([ServiceTag::General])
        );
    }

    #[test]
    fn unknown_city_uses_default_centroid_and_is_counted() {
        let rows = vec![row("n1", "Atlantis", ""), row("n2", "Atlantis", ""), row("n3", "Holon", "")];
        let report = normalize_rows(rows, &CityTable::builtin());

        assert_eq!(report.city_fallbacks, 2);
        assert_eq!(report.providers[0].coordinates, Some(DEFAULT_CENTROID));
        assert_ne!(report.providers[2].coordinates, Some(DEFAULT_CENTROID));
    }

    #[test]
    fn derived_ratings_follow_the_id_hash() {
        let report = normalize_rows(vec![row("n1", "Haifa", "")], &CityTable::builtin());
        let provider = &report.providers[0];
        assert_eq!(provider.rating_source, RatingSource::Derived);
        assert!((provider.rating - 4.388).abs() < 1e-9);
        assert_eq!(provider.review_count, 103);
    }

    #[test]
    fn sourced_ratings_are_clamped_into_range() {
        let mut sourced = row("n1", "Haifa", "");
        sourced.rating = Some("9.5".into());
        sourced.reviews_count = Some("12".into());
        let report = normalize_rows(vec![sourced], &CityTable::builtin());
        let provider = &report.providers[0];
        assert_eq!(provider.rating_source, RatingSource::Sourced);
        assert_eq!(provider.rating, 5.0);
        assert_eq!(provider.review_count, 12);
    }

    #[test]
    fn explicit_false_flags_disable_the_record() {
        let mut inactive = row("n1", "Haifa", "");
        inactive.is_active = Some("false".into());
        let mut unflagged = row("n2", "Haifa", "");
        unflagged.is_active = None;
        unflagged.is_approved = None;

        let report = normalize_rows(vec![inactive, unflagged], &CityTable::builtin());
        assert!(!report.providers[0].is_matchable());
        assert!(report.providers[1].is_matchable());
    }

    #[test]
    fn availability_columns_become_dated_windows() {
        let mut with_window = row("n1", "Haifa", "");
        with_window.from_datetime_utc = Some("2025-03-02 08:00:00".into());
        with_window.to_datetime_utc = Some("2025-03-02 12:00:00".into());
        let mut broken = row("n1", "Haifa", "");
        broken.from_datetime_utc = Some("yesterday".into());
        broken.to_datetime_utc = Some("2025-03-02 12:00:00".into());

        let report = normalize_rows(vec![with_window, broken], &CityTable::builtin());
        assert_eq!(report.providers[0].availability.len(), 1);
        assert_eq!(report.invalid_windows, 1);
    }

    #[test]
    fn display_name_prefers_explicit_then_full_name_then_synthetic() {
        let mut named = row("abcdef123456", "Haifa", "");
        named.first_name = Some("Dana".into());
        named.last_name = Some("Levi".into());
        let anonymous = row("zz-anon-000001", "Haifa", "");

        let report = normalize_rows(vec![named, anonymous], &CityTable::builtin());
        assert_eq!(report.providers[0].display_name, "Dana Levi");
        assert_eq!(report.providers[0].aliases, vec!["Dana", "Levi"]);
        assert_eq!(report.providers[1].display_name, "Nurse zz-anon-");
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let rows = || {
            vec![
                row("b", "Tel Aviv", "WOUND_TREATMENT"),
                row("a", "Atlantis", "PEDIATRICS"),
                row("b", "Holon", "HOME_NEWBORN_VISIT"),
            ]
        };
        let first = normalize_rows(rows(), &CityTable::builtin());
        let second = normalize_rows(rows(), &CityTable::builtin());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.providers).unwrap(),
            serde_json::to_string(&second.providers).unwrap()
        );
    }

    #[test]
    fn every_provider_has_tags_and_rating_in_range() {
        let rows = (0..50).map(|i| row(&format!("p{i}"), "Haifa", if i % 3 == 0 { "" } else { "BLOOD_TESTS" }));
        let report = normalize_rows(rows, &CityTable::builtin());
        for provider in &report.providers {
            assert!(!provider.service_tags.is_empty());
            assert!((3.5..=5.0).contains(&provider.rating));
        }
    }
}
