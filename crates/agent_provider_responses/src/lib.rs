//! Responses-endpoint implementation of the shared `agent_provider` contract.
//!
//! The endpoint is stateful: each round returns a response id, and later
//! rounds send only the new function call outputs plus that id as
//! `previous_response_id`.

use std::sync::Arc;
use std::time::Duration;

use agent_provider::{
    run_conversation, Conversation, EventSink, ModelProvider, PriceTable, ProviderError,
    ProviderInitError, Round, RoundUsage, RunOutcome, RunRequest, ToolCallRequest, ToolReply,
    UsageRecorder,
};
use async_trait::async_trait;
use responses_api::{
    InputItem, OutputItem, ResponsesApiClient, ResponsesApiConfig, ResponsesApiError,
    ResponsesRequest, ResponsesStreamEvent, StreamResult,
};
use serde_json::Value;
use tracing::debug;

/// Stable provider identifier used by the provider registry.
pub const RESPONSES_PROVIDER_ID: &str = "openai";

/// Runtime configuration for the responses provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsesProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub max_output_tokens: Option<u32>,
    /// Overrides the built-in price table for every model.
    pub price: Option<PriceTable>,
}

impl ResponsesProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: None,
            max_output_tokens: None,
            price: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    #[must_use]
    pub fn with_price(mut self, price: PriceTable) -> Self {
        self.price = Some(price);
        self
    }

    fn to_api_config(&self) -> ResponsesApiConfig {
        let mut config = ResponsesApiConfig::new(self.api_key.clone());

        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

#[async_trait]
trait StreamClient: Send + Sync {
    async fn stream(&self, request: &ResponsesRequest) -> Result<StreamResult, ResponsesApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: ResponsesApiClient,
}

#[async_trait]
impl StreamClient for DefaultStreamClient {
    async fn stream(&self, request: &ResponsesRequest) -> Result<StreamResult, ResponsesApiError> {
        self.client.stream(request).await
    }
}

/// `ModelProvider` adapter backed by `responses_api` transport primitives.
pub struct ResponsesProvider {
    stream_client: Arc<dyn StreamClient>,
    max_output_tokens: Option<u32>,
    price: Option<PriceTable>,
}

impl ResponsesProvider {
    /// Creates a provider using the real HTTP transport.
    pub fn new(config: ResponsesProviderConfig) -> Result<Self, ProviderInitError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderInitError::new(
                "Failed to initialize openai provider: API key is required",
            ));
        }

        let client = ResponsesApiClient::new(config.to_api_config()).map_err(map_init_error)?;
        Ok(Self {
            stream_client: Arc::new(DefaultStreamClient { client }),
            max_output_tokens: config.max_output_tokens,
            price: config.price,
        })
    }

    fn price_for(&self, model: &str) -> PriceTable {
        self.price
            .or_else(|| PriceTable::for_model(model))
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            stream_client,
            max_output_tokens: None,
            price: None,
        }
    }
}

#[async_trait]
impl ModelProvider for ResponsesProvider {
    fn provider_id(&self) -> &'static str {
        RESPONSES_PROVIDER_ID
    }

    async fn run(
        &self,
        request: RunRequest,
        usage: &mut dyn UsageRecorder,
        emit: EventSink<'_>,
    ) -> Result<RunOutcome, ProviderError> {
        let mut conversation = ResponsesConversation {
            client: self.stream_client.as_ref(),
            request: &request,
            price: self.price_for(&request.model),
            max_output_tokens: self.max_output_tokens,
            previous_response_id: None,
            pending_input: vec![InputItem::user(request.prompt.clone())],
        };

        run_conversation(&mut conversation, &request, usage, emit).await
    }
}

struct ResponsesConversation<'a> {
    client: &'a dyn StreamClient,
    request: &'a RunRequest,
    price: PriceTable,
    max_output_tokens: Option<u32>,
    previous_response_id: Option<String>,
    pending_input: Vec<InputItem>,
}

impl ResponsesConversation<'_> {
    fn build_request(&mut self) -> ResponsesRequest {
        ResponsesRequest::new(&self.request.model, std::mem::take(&mut self.pending_input))
            .with_instructions(&self.request.system)
            .with_previous_response_id(self.previous_response_id.clone())
            .with_tools(self.request.tools.definitions())
            .with_reasoning_effort(self.request.reasoning_effort)
            .with_verbosity(self.request.verbosity)
            .with_max_output_tokens(self.max_output_tokens)
    }
}

#[async_trait]
impl<'a> Conversation for ResponsesConversation<'a> {
    async fn next_round(&mut self) -> Result<Round, ProviderError> {
        let payload = self.build_request();
        let result = self.client.stream(&payload).await?;

        if !result.response.id.is_empty() {
            self.previous_response_id = Some(result.response.id.clone());
        }
        debug!(
            session_id = %self.request.session_id,
            response_id = %result.response.id,
            "responses round received"
        );

        Ok(round_from_stream(result, &self.price))
    }

    fn push_tool_replies(&mut self, replies: Vec<ToolReply>) {
        self.pending_input = replies
            .into_iter()
            .map(|reply| InputItem::function_output(reply.call_id, reply.content))
            .collect();
    }
}

/// Splits one streamed response into reasoning, buffered text and tool calls.
///
/// Completed output items are authoritative; deltas are only used when the
/// stream carried no completed item of that kind.
fn round_from_stream(result: StreamResult, price: &PriceTable) -> Round {
    let mut round = Round {
        usage: RoundUsage::priced(
            result.response.usage.input_tokens,
            result.response.usage.output_tokens,
            price,
        ),
        ..Round::default()
    };
    let mut text_delta = String::new();
    let mut reasoning_delta = String::new();
    let mut saw_message = false;

    for event in result.events {
        match event {
            ResponsesStreamEvent::OutputTextDelta { delta } => text_delta.push_str(&delta),
            ResponsesStreamEvent::ReasoningSummaryTextDelta { delta } => {
                reasoning_delta.push_str(&delta)
            }
            ResponsesStreamEvent::OutputItemDone { item } => match item {
                OutputItem::Message { text } => {
                    saw_message = true;
                    round.text.push_str(&text);
                }
                OutputItem::Reasoning { summary } => round.reasoning.extend(summary),
                OutputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } => round
                    .tool_calls
                    .push(ToolCallRequest::new(call_id, name, parse_arguments(&arguments))),
                OutputItem::Other { .. } => {}
            },
            _ => {}
        }
    }

    if !saw_message {
        round.text = text_delta;
    }
    if round.reasoning.is_empty() && !reasoning_delta.is_empty() {
        round.reasoning.push(reasoning_delta);
    }

    round
}

/// Malformed argument text is passed through as a string so the tool call
/// fails recoverably instead of aborting the run.
fn parse_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
}

fn map_init_error(error: ResponsesApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize openai provider: {error}"))
}
