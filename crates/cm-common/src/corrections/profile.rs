use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::normalize::normalize_token;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Mobility {
    Independent,
    Walker,
    Wheelchair,
    Bedridden,
    WalkingCane,
}

impl Mobility {
    pub fn expertise_tag(self) -> &'static str {
        match self {
            Mobility::Independent => "independent",
            Mobility::Walker => "mobility-walker",
            Mobility::Wheelchair => "mobility-wheelchair",
            Mobility::Bedridden => "mobility-bedridden",
            Mobility::WalkingCane => "mobility-cane",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Gender {
    #[strum(serialize = "MALE", serialize = "M")]
    Male,
    #[strum(serialize = "FEMALE", serialize = "F")]
    Female,
}

/// `"walking cane"`, `"Walking-Cane"` and `"WALKING_CANE"` are the same value.
pub fn correct_mobility(input: &str) -> Option<Mobility> {
    let key = normalize_token(input).replace(' ', "_");
    if key.is_empty() {
        return None;
    }
    Mobility::from_str(&key).ok()
}

pub fn correct_gender(input: &str) -> Option<Gender> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(gender) = Gender::from_str(trimmed) {
        return Some(gender);
    }
    match trimmed {
        "זכר" | "גבר" => Some(Gender::Male),
        "נקבה" | "אישה" => Some(Gender::Female),
        _ => None,
    }
}

/// Expertise tags from the mobility column, the record status and remarks.
pub fn extract_expertise(mobility: Option<Mobility>, status: &str, remarks: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();

    if let Some(mobility) = mobility {
        tags.insert(mobility.expertise_tag().to_string());
    }

    let status = normalize_token(status);
    if status.contains("cancelled") || status.contains("closed") {
        tags.insert("experienced".to_string());
    }
    if status.contains("active") {
        tags.insert("active".to_string());
    }

    let remarks = normalize_token(remarks);
    for (marker, tag) in [
        ("urgent", "urgent-care"),
        ("night", "night-shift"),
        ("day", "day-shift"),
    ] {
        if remarks.contains(marker) {
            tags.insert(tag.to_string());
        }
    }

    tags
}
