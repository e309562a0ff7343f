pub mod hebrew;
pub mod profile;
pub mod service_tags;

pub use hebrew::{URGENCY_MARKERS, fold_hebrew, has_urgency_marker};
pub use profile::{Gender, Mobility, correct_gender, correct_mobility, extract_expertise};
pub use service_tags::{ServiceTag, canonicalize_term, extract_service_tags};
