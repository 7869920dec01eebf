use std::fmt;

use agent_provider::ProviderError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum ResponsesApiError {
    MissingApiKey,
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    StreamFailed {
        code: Option<String>,
        message: String,
    },
    /// The stream closed before a terminal `response.completed` event.
    IncompleteStream,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayloadFields {
    message: Option<String>,
    code: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

impl fmt::Display for ResponsesApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                write!(
                    f,
                    "retry exhausted after max attempts (status: {status}, last_error: {last_error:?})"
                )
            }
            Self::StreamFailed { code, message } => match code {
                Some(code) if !code.trim().is_empty() => {
                    write!(f, "stream failed ({code}): {message}")
                }
                _ => write!(f, "stream failed: {message}"),
            },
            Self::IncompleteStream => write!(f, "stream ended before the response completed"),
        }
    }
}

impl std::error::Error for ResponsesApiError {}

impl From<reqwest::Error> for ResponsesApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for ResponsesApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

impl From<ResponsesApiError> for ProviderError {
    fn from(error: ResponsesApiError) -> Self {
        match error {
            ResponsesApiError::Status(status, message) => ProviderError::Status {
                status: status.as_u16(),
                message,
            },
            ResponsesApiError::Serde(error) => ProviderError::decode(error.to_string()),
            ResponsesApiError::StreamFailed { .. } | ResponsesApiError::IncompleteStream => {
                ProviderError::decode(error.to_string())
            }
            other => ProviderError::transport(other.to_string()),
        }
    }
}

/// Extracts a readable message from an error response body.
///
/// Bodies shaped as `{"error":{"message":..}}` yield the message, falling back
/// to the error code or type; anything else is returned verbatim.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fields = serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.error);

    if let Some(fields) = fields {
        let candidate = [fields.message, fields.code, fields.type_]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty());
        if let Some(message) = candidate {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
