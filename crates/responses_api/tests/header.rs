use responses_api::headers::{
    build_headers, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_ORGANIZATION,
    HEADER_USER_AGENT,
};
use responses_api::{ResponsesApiConfig, ResponsesApiError};

#[test]
fn header_map_contains_bearer_and_stream_headers() {
    let config = ResponsesApiConfig::new(" sk-test ")
        .with_organization("org-1")
        .insert_header("X-Extra", "value");

    let headers = build_headers(&config).expect("header construction");
    assert_eq!(headers.get(HEADER_AUTHORIZATION).map(String::as_str), Some("Bearer sk-test"));
    assert_eq!(headers.get(HEADER_ACCEPT).map(String::as_str), Some("text/event-stream"));
    assert_eq!(headers.get(HEADER_CONTENT_TYPE).map(String::as_str), Some("application/json"));
    assert_eq!(headers.get(HEADER_ORGANIZATION).map(String::as_str), Some("org-1"));
    assert_eq!(headers.get("x-extra").map(String::as_str), Some("value"));
    assert!(headers
        .get(HEADER_USER_AGENT)
        .is_some_and(|agent| agent.starts_with("coding-agent/")));
}

#[test]
fn explicit_user_agent_wins() {
    let config = ResponsesApiConfig::new("sk").with_user_agent("test-agent");
    let headers = build_headers(&config).expect("header construction");
    assert_eq!(headers.get(HEADER_USER_AGENT).map(String::as_str), Some("test-agent"));
}

#[test]
fn blank_api_key_is_rejected() {
    let error = build_headers(&ResponsesApiConfig::new("  ")).expect_err("missing key");
    assert!(matches!(error, ResponsesApiError::MissingApiKey));
}
