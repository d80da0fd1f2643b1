use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Placeholder values spreadsheets leave behind that carry no information.
pub const INVALID_VALUES: &[&str] = &["", "#N/A", "N/A", "na", "NaN"];

/// Lowercase, trimmed, accent-free form used to compare worksheet titles.
pub fn fold_name(raw: &str) -> String {
    raw.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

pub fn is_placeholder(value: &str) -> bool {
    INVALID_VALUES.contains(&value.trim())
}
