use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

pub const RATING_MIN: f64 = 3.5;
pub const RATING_MAX: f64 = 5.0;
pub const DERIVED_REVIEWS_MIN: u32 = 5;
pub const DERIVED_REVIEWS_SPAN: u32 = 100;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

static RE_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_\-\s]+").expect("separator pattern is valid"));

/// Lowercase, NFKC-fold and turn `_`/`-`/whitespace runs into single spaces.
///
/// `"WOUND_TREATMENT"`, `"wound-treatment"` and `" Wound  Treatment "` all
/// become `"wound treatment"`.
pub fn normalize_token(raw: &str) -> String {
    let folded = raw.nfkc().collect::<String>().to_lowercase();
    RE_SEPARATORS.replace_all(&folded, " ").trim().to_string()
}

/// FNV-1a (32-bit) over UTF-16 code units, reduced to `[0, 1)` in steps of 0.001.
///
/// The output must stay bit-for-bit stable: derived ratings are persisted in
/// snapshots and compared across runs.
pub fn hash_to_unit(input: &str) -> f64 {
    let mut hash = FNV_OFFSET_BASIS;
    for unit in input.encode_utf16() {
        hash ^= u32::from(unit);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    f64::from(hash % 1000) / 1000.0
}

/// Synthetic rating for a provider without a real one.
pub fn derive_rating(provider_id: &str) -> f64 {
    RATING_MIN + hash_to_unit(provider_id) * (RATING_MAX - RATING_MIN)
}

/// Synthetic review count, salted so it is independent of the rating.
pub fn derive_review_count(provider_id: &str) -> u32 {
    let unit = hash_to_unit(&format!("{provider_id}reviews"));
    (unit * f64::from(DERIVED_REVIEWS_SPAN)).floor() as u32 + DERIVED_REVIEWS_MIN
}

pub fn clamp_rating(rating: f64) -> f64 {
    if rating.is_nan() {
        return RATING_MIN;
    }
    rating.clamp(RATING_MIN, RATING_MAX)
}

/// Accepts `true`, `t`, `1`, `yes` (any case). Everything else is false.
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "t" | "1" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_token_folds_separators_and_case() {
        assert_eq!(normalize_token("WOUND_TREATMENT"), "wound treatment");
        assert_eq!(normalize_token("day-night"), "day night");
        assert_eq!(normalize_token("  Home   Care "), "home care");
        assert_eq!(normalize_token("_hospital"), "hospital");
        assert_eq!(normalize_token(""), "");
    }

    #[test]
    fn normalize_token_applies_nfkc() {
        assert_eq!(normalize_token("ＷＯＵＮＤ"), "wound");
    }

    #[test]
    fn hash_to_unit_matches_reference_values() {
        assert_eq!(hash_to_unit(""), 0.261);
        assert_eq!(hash_to_unit("a"), 0.22);
        assert_eq!(hash_to_unit("n1"), 0.592);
        assert_eq!(hash_to_unit("n1reviews"), 0.989);
        assert_eq!(hash_to_unit("אחות"), 0.191);
    }

    #[test]
    fn derived_rating_and_reviews_are_stable_and_in_range() {
        assert!((derive_rating("n1") - 4.388).abs() < 1e-9);
        assert_eq!(derive_review_count("n1"), 103);
        assert_eq!(derive_review_count("nurse-001"), 29);

        for id in ["", "x", "nurse-42", "0f9a7c", "אחות-7"] {
            let rating = derive_rating(id);
            assert!((RATING_MIN..=RATING_MAX).contains(&rating), "{id}: {rating}");
            let reviews = derive_review_count(id);
            assert!((5..=104).contains(&reviews), "{id}: {reviews}");
            assert_eq!(rating, derive_rating(id));
        }
    }

    #[test]
    fn clamp_rating_pins_out_of_range_values() {
        assert_eq!(clamp_rating(7.0), RATING_MAX);
        assert_eq!(clamp_rating(1.0), RATING_MIN);
        assert_eq!(clamp_rating(f64::NAN), RATING_MIN);
        assert_eq!(clamp_rating(4.2), 4.2);
    }

    #[test]
    fn parse_flag_accepts_common_truthy_spellings() {
        for raw in ["true", "T", "1", "Yes", " yes "] {
            assert!(parse_flag(raw), "{raw}");
        }
        for raw in ["false", "0", "", "no", "maybe"] {
            assert!(!parse_flag(raw), "{raw}");
        }
    }
}
