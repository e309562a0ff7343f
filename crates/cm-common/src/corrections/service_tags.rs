use std::collections::BTreeSet;
use once_cell::sync::Lazy;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

use crate::normalize::normalize_token;

/// Closed vocabulary of canonical services.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceTag {
    WoundCare,
    Medication,
    Hospital,
    HomeCare,
    Pediatrics,
    DayNight,
    Circumcision,
    General,
    Catheter,
    Stoma,
    Enema,
}

impl ServiceTag {
    /// Lowercase human label, also the normalized form used in substring matching.
    pub fn label(self) -> &'static str {
        match self {
            ServiceTag::WoundCare => "wound care",
            ServiceTag::Medication => "medication",
            ServiceTag::Hospital => "hospital",
            ServiceTag::HomeCare => "home care",
            ServiceTag::Pediatrics => "pediatrics",
            ServiceTag::DayNight => "day night",
            ServiceTag::Circumcision => "circumcision",
            ServiceTag::General => "general",
            ServiceTag::Catheter => "catheter",
            ServiceTag::Stoma => "stoma",
            ServiceTag::Enema => "enema",
        }
    }

    /// Raw tokens that map onto this tag. Source data mixes free text with
    /// upper-case treatment codes, so both appear here.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            ServiceTag::WoundCare => &[
                "wound",
                "wound_treatment",
                "wound_care",
                "WOUND_CARE",
                "WOUND_TREATMENT",
                "DIABETIC_WOUND_TREATMENT",
                "DIFFICULT_WOUND_HEALING_TREATMENT",
                "BURN_TREATMENT",
            ],
            ServiceTag::Medication => &["medication", "meds", "MEDICATION", "MEDICATION_ARRANGEMENT"],
            ServiceTag::Hospital => &[
                "hospital",
                "_hospital",
                "HOSPITAL",
                "PRIVATE_SECURITY_HOSPITAL",
                "FOLLOW_UP_AFTER_SURGERY",
                "CENTRAL_CATHETER_TREATMENT",
                "CATHETER_INSERTION_REPLACEMENT",
            ],
            ServiceTag::HomeCare => &[
                "home",
                "_home",
                "PRIVATE_SECURITY_HOME",
                "GASTROSTOMY_CARE_FEEDING",
                "ESCORTED_BY_NURSE",
                "FERTILITY_TREATMENTS",
            ],
            ServiceTag::Pediatrics => &[
                "pediatrics",
                "child",
                "kids",
                "PEDIATRICS",
                "BREASTFEEDING_CONSULTATION",
                "HOME_NEWBORN_VISIT",
            ],
            ServiceTag::DayNight => &["day_night", "DAY_NIGHT", "DAY_NIGHT_CIRCUMCISION_NURSE"],
            ServiceTag::Circumcision => &["circumcision", "CIRCUMCISION_NURSE"],
            ServiceTag::General => &[
                "default",
                "general",
                "nurse",
                "DEFAULT",
                "BLOOD_TESTS",
                "ENEMA_UNDER_INSTRUCTION",
                "HEALTHY_LIFESTYLE_GUIDANCE",
                "HANDLING_AND_TRACKING_METRICS",
            ],
            ServiceTag::Catheter => &[
                "catheter",
                "CENTRAL_CATHETER_TREATMENT",
                "CATHETER_INSERTION_REPLACEMENT",
            ],
            ServiceTag::Stoma => &["stoma", "STOMA_TREATMENT"],
            ServiceTag::Enema => &["enema", "ENEMA_UNDER_INSTRUCTION"],
        }
    }
}

struct Synonym {
    tag: ServiceTag,
    raw: &'static str,
    normalized: String,
}

/// Every synonym with its normalized form computed once.
static SYNONYM_TABLE: Lazy<Vec<Synonym>> = Lazy::new(|| {
    ServiceTag::iter()
        .flat_map(|tag| {
            tag.synonyms().iter().map(move |raw| Synonym {
                tag,
                raw,
                normalized: normalize_token(raw),
            })
        })
        .filter(|synonym| !synonym.normalized.is_empty())
        .collect()
});

fn tags_in_field(field: &str, tags: &mut BTreeSet<ServiceTag>) {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return;
    }
    let normalized = normalize_token(trimmed);
    for synonym in SYNONYM_TABLE.iter() {
        if trimmed == synonym.raw || normalized.contains(&synonym.normalized) {
            tags.insert(synonym.tag);
        }
    }
}

/// Canonical tags mentioned in any of the three free-text fields of a raw row.
///
/// May be empty; the `GENERAL` fallback is applied per provider once all of
/// its rows are merged.
pub fn extract_service_tags(primary: &str, alternate: &str, remarks: &str) -> BTreeSet<ServiceTag> {
    let mut tags = BTreeSet::new();
    for field in [primary, alternate, remarks] {
        tags_in_field(field, &mut tags);
    }
    tags
}

/// Canonical tags a free-text query term refers to, e.g. `"Wound Care"` or
/// `"burn_treatment"` -> `{WOUND_CARE}`.
pub fn canonicalize_term(term: &str) -> BTreeSet<ServiceTag> {
    let mut tags = BTreeSet::new();
    tags_in_field(term, &mut tags);

    let normalized = normalize_token(term);
    if let Some(tag) = ServiceTag::iter().find(|tag| normalize_token(tag.as_ref()) == normalized) {
        tags.insert(tag);
    }
    tags
}
