/// Default base URL for responses requests.
pub const DEFAULT_RESPONSES_BASE_URL: &str = "https://api.openai.com/v1";

/// Normalize a base URL to a responses endpoint.
///
/// Normalization rules:
/// 1) keep a path ending in `/responses` unchanged
/// 2) append `/responses` otherwise
/// 3) blank input falls back to [`DEFAULT_RESPONSES_BASE_URL`]
pub fn normalize_responses_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_RESPONSES_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/responses") {
        return trimmed.to_string();
    }
    format!("{trimmed}/responses")
}
