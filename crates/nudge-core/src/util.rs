//! Small helpers shared by the config, auth and remote modules.

/// Trim optional text, treating blank values as unset.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Validate an `http(s)` base URL and strip trailing slashes so paths can be
/// appended with a single `/`.
///
/// Returns `None` for any other scheme.
pub fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return None;
    }
    Some(trimmed.trim_end_matches('/').to_string())
}

/// First 180 characters of a response body or value, for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}
