use agent_provider::ProviderError;
use reqwest::StatusCode;

use responses_api::error::parse_error_message;
use responses_api::ResponsesApiError;

#[test]
fn parse_error_message_prefers_json_message() {
    let body = r#"{"error":{"code":"bad_request","message":"invalid model"}}"#;
    assert_eq!(parse_error_message(StatusCode::BAD_REQUEST, body), "invalid model");
}

#[test]
fn parse_error_message_falls_back_to_code() {
    let body = r#"{"error":{"code":"rate_limit_exceeded","message":""}}"#;
    assert_eq!(
        parse_error_message(StatusCode::TOO_MANY_REQUESTS, body),
        "rate_limit_exceeded"
    );
}

#[test]
fn parse_error_message_falls_back_to_raw_body_or_reason() {
    assert_eq!(
        parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, "raw failure text"),
        "raw failure text"
    );
    assert_eq!(
        parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
        "Service Unavailable"
    );
}

#[test]
fn transport_errors_map_to_provider_errors() {
    let status: ProviderError =
        ResponsesApiError::Status(StatusCode::BAD_REQUEST, "invalid model".to_owned()).into();
    assert!(matches!(status, ProviderError::Status { status: 400, ref message } if message == "invalid model"));

    let incomplete: ProviderError = ResponsesApiError::IncompleteStream.into();
    assert!(matches!(incomplete, ProviderError::Decode(_)));

    let missing: ProviderError = ResponsesApiError::MissingApiKey.into();
    assert!(matches!(missing, ProviderError::Transport(_)));
}
