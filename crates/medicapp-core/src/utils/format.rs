use chrono::{DateTime, NaiveDate};

/// Display form for dates in tables, e.g. `17 May 1990`.
const DISPLAY_DATE: &str = "%d %b %Y";

/// Case-insensitive substring match; an empty needle matches everything
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Clip text to a table column of `width` characters, marking the cut with `…`.
pub fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    match width {
        0 => String::new(),
        _ => text.chars().take(width - 1).chain(std::iter::once('…')).collect(),
    }
}

/// The value, or `placeholder` when it is missing or blank.
pub fn format_optional(value: Option<&str>, placeholder: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(placeholder)
        .to_string()
}

/// Calendar date of an API date field.
///
/// The API sends `DOB` and `created_at` either as full RFC 3339 timestamps or
/// as bare `YYYY-MM-DD` dates.
pub fn parse_api_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

/// Render an API date field for display; unparseable input is shown as sent.
pub fn format_date(value: &str) -> String {
    match parse_api_date(value) {
        Some(date) => date.format(DISPLAY_DATE).to_string(),
        None => format_optional(Some(value), "-"),
    }
}
