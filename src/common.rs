use chrono::NaiveDate;

/// Display name used when no row or patient profile carries a usable name.
pub const UNKNOWN_NAME: &str = "Unknown";

pub fn truncate_for_log(text: &str) -> String {
    let trimmed = text.trim();
    let max_len = 300usize;
    if trimmed.len() <= max_len {
        trimmed.to_string()
    } else {
        let mut end = max_len;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

/// Trim and drop empty strings.
pub fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Tax ID (CPF) with every non-digit stripped. `None` when nothing is left.
pub fn normalize_tax_id(value: Option<&str>) -> Option<String> {
    let digits: String = value?.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() { None } else { Some(digits) }
}

/// Lower-cased, trimmed display name. `None` for blank names.
pub fn normalize_name(value: Option<&str>) -> Option<String> {
    clean(value).map(|s| s.to_lowercase())
}

pub fn is_numeric_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

/// Placeholder or numeric names get replaced whenever a proper name shows up.
pub fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim();
    name.is_empty()
        || name == UNKNOWN_NAME
        || name.starts_with(&format!("{UNKNOWN_NAME} #"))
        || is_numeric_name(name)
}

pub fn is_proper_name(name: Option<&str>) -> bool {
    name.map(|n| !is_placeholder_name(n)).unwrap_or(false)
}

/// Accepts `YYYY-MM-DD` and ISO timestamps (only the calendar date is kept).
pub fn parse_purchase_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
