use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use agent_provider::retry::is_retryable_http_error;

use crate::config::ResponsesApiConfig;
use crate::error::{parse_error_message, ResponsesApiError};
use crate::events::{ResponseSummary, ResponsesStreamEvent};
use crate::headers::build_headers;
use crate::payload::ResponsesRequest;
use crate::sse::SseStreamParser;
use crate::url::normalize_responses_url;

#[derive(Debug)]
pub struct ResponsesApiClient {
    http: Client,
    config: ResponsesApiConfig,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<ResponsesStreamEvent>,
    pub response: ResponseSummary,
}

impl ResponsesApiClient {
    pub fn new(config: ResponsesApiConfig) -> Result<Self, ResponsesApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ResponsesApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ResponsesApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_responses_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ResponsesApiError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config)? {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ResponsesApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value)
                    .map_err(|_| ResponsesApiError::InvalidHeader(format!("invalid header value for {key}")))?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ResponsesRequest,
    ) -> Result<reqwest::RequestBuilder, ResponsesApiError> {
        let headers = self.build_headers()?;
        let mut payload = request.clone();
        payload.stream = true;
        payload.store = true;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(&payload))
    }

    /// Sends the request, retrying transient statuses and connection failures.
    pub async fn send_with_retry(
        &self,
        request: &ResponsesRequest,
    ) -> Result<Response, ResponsesApiError> {
        let retry = self.config.retry;
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;
        let mut attempt = 0;

        loop {
            match self.build_request(request)?.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status);
                    let body = response.text().await.unwrap_or_default();
                    let message = parse_error_message(status, &body);

                    if retry.allows_retry(attempt) && is_retryable_http_error(status.as_u16(), &body) {
                        warn!(status = status.as_u16(), attempt, %message, "retrying responses request");
                        tokio::time::sleep(retry.delay(attempt)).await;
                        attempt += 1;
                        last_error = Some(message);
                        continue;
                    }

                    return Err(ResponsesApiError::Status(status, message));
                }
                Err(error) => {
                    let message = error.to_string();
                    if retry.allows_retry(attempt) {
                        warn!(attempt, %message, "retrying responses request after transport error");
                        tokio::time::sleep(retry.delay(attempt)).await;
                        attempt += 1;
                        last_error = Some(message);
                        continue;
                    }
                    return Err(ResponsesApiError::RetryExhausted {
                        status: last_status,
                        last_error: Some(last_error.unwrap_or(message)),
                    });
                }
            }
        }
    }

    /// Streams one response, handing each event to `on_event` in order.
    ///
    /// Returns the terminal summary; a `response.failed` or `error` event ends
    /// the stream with [`ResponsesApiError::StreamFailed`].
    pub async fn stream_with_handler<F>(
        &self,
        request: &ResponsesRequest,
        mut on_event: F,
    ) -> Result<ResponseSummary, ResponsesApiError>
    where
        F: FnMut(&ResponsesStreamEvent),
    {
        let response = self.send_with_retry(request).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();
        let mut summary = None;

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(ResponsesApiError::from)?;
            for event in parser.feed(&chunk) {
                if let Some(error) = stream_failure_from_event(&event) {
                    return Err(error);
                }
                if let ResponsesStreamEvent::Completed { response } = &event {
                    summary = Some(response.clone());
                }
                on_event(&event);
            }
        }

        let summary = summary.ok_or(ResponsesApiError::IncompleteStream)?;
        debug!(
            response_id = %summary.id,
            input_tokens = summary.usage.input_tokens,
            output_tokens = summary.usage.output_tokens,
            "responses stream completed"
        );
        Ok(summary)
    }

    pub async fn stream(&self, request: &ResponsesRequest) -> Result<StreamResult, ResponsesApiError> {
        let mut events = Vec::new();
        let response = self
            .stream_with_handler(request, |event| events.push(event.clone()))
            .await?;

        Ok(StreamResult { events, response })
    }
}

fn stream_failure_from_event(event: &ResponsesStreamEvent) -> Option<ResponsesApiError> {
    match event {
        ResponsesStreamEvent::Failed { message } => Some(ResponsesApiError::StreamFailed {
            code: None,
            message: message
                .clone()
                .unwrap_or_else(|| "response failed".to_owned()),
        }),
        ResponsesStreamEvent::Error { code, message } => Some(ResponsesApiError::StreamFailed {
            code: code.clone(),
            message: message
                .clone()
                .or_else(|| code.clone())
                .unwrap_or_else(|| "unknown error".to_owned()),
        }),
        _ => None,
    }
}
