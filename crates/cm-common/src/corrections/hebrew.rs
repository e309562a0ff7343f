/// Markers that flag a request as urgent when they appear in free text.
pub const URGENCY_MARKERS: &[&str] = &[
    "דחוף",
    "מיידי",
    "עכשיו",
    "urgent",
    "immediately",
    "asap",
];

fn is_nikud(c: char) -> bool {
    ('\u{0591}'..='\u{05C7}').contains(&c)
}

fn regular_form(c: char) -> char {
    match c {
        'ץ' => 'צ',
        'ף' => 'פ',
        'ך' => 'כ',
        'ם' => 'מ',
        'ן' => 'נ',
        other => other,
    }
}

/// Comparison form of mixed Hebrew/English text: nikud removed, final
/// letters replaced by their regular forms, Latin lowercased.
///
/// For matching only; display strings keep their original spelling.
pub fn fold_hebrew(text: &str) -> String {
    text.chars()
        .filter(|c| !is_nikud(*c))
        .map(regular_form)
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn has_urgency_marker(text: &str) -> bool {
    let folded = fold_hebrew(text);
    URGENCY_MARKERS
        .iter()
        .any(|marker| folded.contains(&fold_hebrew(marker)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_final_letters_and_strips_nikud() {
        assert_eq!(fold_hebrew("שָׁלוֹם"), "שלומ");
        assert_eq!(fold_hebrew("פצעים"), fold_hebrew("פצעימ"));
        assert_eq!(fold_hebrew(" Wound "), "wound");
    }

    #[test]
    fn detects_urgency_in_either_language() {
        assert!(has_urgency_marker("צריך אחות דחוף"));
        assert!(has_urgency_marker("Need someone ASAP"));
        assert!(!has_urgency_marker("routine visit next week"));
    }
}
