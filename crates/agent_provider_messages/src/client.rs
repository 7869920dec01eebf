use std::time::Duration;

use agent_provider::retry::{is_retryable_http_error, RetryPolicy};
use agent_provider::ProviderError;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::payload::{MessagesRequest, MessagesResponse};

pub const DEFAULT_MESSAGES_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum MessagesApiError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<MessagesApiError> for ProviderError {
    fn from(error: MessagesApiError) -> Self {
        match error {
            MessagesApiError::Status { status, message } => ProviderError::Status { status, message },
            MessagesApiError::Decode(error) => ProviderError::decode(error.to_string()),
            other => ProviderError::transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessagesClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl MessagesClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_MESSAGES_BASE_URL.to_string(),
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Normalize a base URL to the messages endpoint.
pub fn normalize_messages_url(input: &str) -> String {
    let base = input.trim();
    let base = if base.is_empty() { DEFAULT_MESSAGES_BASE_URL } else { base };
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/messages") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/messages")
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorFields>,
}

#[derive(Debug, Deserialize)]
struct ErrorFields {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .and_then(|fields| {
            [fields.message, fields.type_]
                .into_iter()
                .flatten()
                .find(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.to_string()
            }
        })
}

/// Non-streaming client for the messages endpoint.
#[derive(Debug)]
pub struct MessagesClient {
    http: Client,
    config: MessagesClientConfig,
}

impl MessagesClient {
    pub fn new(config: MessagesClientConfig) -> Result<Self, MessagesApiError> {
        if config.api_key.trim().is_empty() {
            return Err(MessagesApiError::MissingApiKey);
        }
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn endpoint(&self) -> String {
        normalize_messages_url(&self.config.base_url)
    }

    /// Sends one request, retrying transient failures per the configured policy.
    pub async fn create(&self, request: &MessagesRequest) -> Result<MessagesResponse, MessagesApiError> {
        let retry = self.config.retry;
        let mut attempt = 0;

        loop {
            let sent = self
                .http
                .post(self.endpoint())
                .header("x-api-key", self.config.api_key.trim())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(request)
                .send()
                .await;

            let error = match sent {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await?;
                    return Ok(serde_json::from_str(&body)?);
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    if !is_retryable_http_error(status.as_u16(), &body) {
                        return Err(MessagesApiError::Status {
                            status: status.as_u16(),
                            message,
                        });
                    }
                    MessagesApiError::Status {
                        status: status.as_u16(),
                        message,
                    }
                }
                Err(error) => MessagesApiError::Request(error),
            };

            if !retry.allows_retry(attempt) {
                return Err(error);
            }
            warn!(attempt, %error, "retrying messages request");
            tokio::time::sleep(retry.delay(attempt)).await;
            attempt += 1;
        }
    }
}
