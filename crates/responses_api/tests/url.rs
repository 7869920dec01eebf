use responses_api::normalize_responses_url;

#[test]
fn url_normalization_keeps_existing_responses_endpoint() {
    assert_eq!(
        normalize_responses_url("https://api.openai.com/v1/responses"),
        "https://api.openai.com/v1/responses"
    );
}

#[test]
fn url_normalization_appends_responses_to_base() {
    assert_eq!(
        normalize_responses_url("https://api.openai.com/v1/"),
        "https://api.openai.com/v1/responses"
    );
    assert_eq!(
        normalize_responses_url("http://127.0.0.1:8080"),
        "http://127.0.0.1:8080/responses"
    );
}

#[test]
fn url_normalization_defaults_blank_input() {
    assert_eq!(
        normalize_responses_url("   "),
        "https://api.openai.com/v1/responses"
    );
}
