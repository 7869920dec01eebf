//! Raw text completion transport.

use std::time::Duration;

use agent_provider::retry::{is_retryable_http_error, RetryPolicy};
use agent_provider::ProviderError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_COMPLETIONS_BASE_URL: &str = "http://127.0.0.1:8000/v1";

#[derive(Debug, Error)]
pub enum CompletionsError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode completion: {0}")]
    Decode(String),
}

impl From<CompletionsError> for ProviderError {
    fn from(error: CompletionsError) -> Self {
        match error {
            CompletionsError::Status { status, message } => ProviderError::Status { status, message },
            CompletionsError::Decode(message) => ProviderError::decode(message),
            other => ProviderError::transport(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    /// Keeps special tokens in the returned text so it can be decoded.
    pub skip_special_tokens: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: CompletionUsage,
}

impl CompletionResponse {
    pub fn text(&self) -> Result<&str, CompletionsError> {
        self.choices
            .first()
            .map(|choice| choice.text.as_str())
            .ok_or_else(|| CompletionsError::Decode("response has no choices".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct CompletionsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for CompletionsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_COMPLETIONS_BASE_URL.to_string(),
            timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub fn normalize_completions_url(input: &str) -> String {
    let base = input.trim();
    let base = if base.is_empty() { DEFAULT_COMPLETIONS_BASE_URL } else { base };
    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/completions") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/completions")
    }
}

#[derive(Debug)]
pub struct CompletionsClient {
    http: Client,
    config: CompletionsConfig,
}

impl CompletionsClient {
    pub fn new(config: CompletionsConfig) -> Result<Self, CompletionsError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionsError> {
        let retry = self.config.retry;
        let endpoint = normalize_completions_url(&self.config.base_url);
        let mut attempt = 0;

        loop {
            let mut builder = self.http.post(&endpoint).json(request);
            if let Some(api_key) = self.config.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
                builder = builder.bearer_auth(api_key.trim());
            }

            let error = match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    let body = response.text().await?;
                    return serde_json::from_str(&body)
                        .map_err(|error| CompletionsError::Decode(error.to_string()));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    let retryable = is_retryable_http_error(status, &body);
                    let error = CompletionsError::Status {
                        status,
                        message: error_message(&body),
                    };
                    if !retryable {
                        return Err(error);
                    }
                    error
                }
                Err(error) => CompletionsError::Request(error),
            };

            if !retry.allows_retry(attempt) {
                return Err(error);
            }
            warn!(attempt, %error, "retrying completion request");
            tokio::time::sleep(retry.delay(attempt)).await;
            attempt += 1;
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .or_else(|| value.get("detail"))
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
