//! Messages-endpoint implementation of the shared `agent_provider` contract.
//!
//! The conversation is resent in full every round. Thinking is requested as a
//! content block sized by the reasoning effort, and thinking blocks are echoed
//! back unchanged with the assistant turn they belong to.

pub mod client;
pub mod payload;

use std::sync::Arc;
use std::time::Duration;

use agent_provider::{
    run_conversation, Conversation, EventSink, ModelProvider, PriceTable, ProviderError,
    ProviderInitError, ReasoningEffort, Round, RoundUsage, RunOutcome, RunRequest, ToolCallRequest,
    ToolReply, UsageRecorder,
};
use async_trait::async_trait;
use tracing::debug;

use crate::client::{MessagesApiError, MessagesClient, MessagesClientConfig};
use crate::payload::{
    ContentBlock, Message, MessagesRequest, MessagesResponse, Role, ThinkingConfig, ToolSpec,
};

/// Stable provider identifier used by the provider registry.
pub const MESSAGES_PROVIDER_ID: &str = "anthropic";

pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Headroom kept above the thinking budget for the visible answer.
const ANSWER_HEADROOM_TOKENS: u32 = 4096;

const CONTINUE_PROMPT: &str = "Continue.";

/// Thinking budget for an effort level; `None` disables thinking.
#[must_use]
pub fn thinking_budget(effort: Option<ReasoningEffort>) -> Option<u32> {
    match effort? {
        ReasoningEffort::Low => None,
        ReasoningEffort::Medium => Some(4096),
        ReasoningEffort::High => Some(16384),
    }
}

/// Runtime configuration for the messages provider.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagesProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub max_tokens: u32,
    /// Overrides the built-in price table for every model.
    pub price: Option<PriceTable>,
}

impl MessagesProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: None,
            max_tokens: DEFAULT_MAX_TOKENS,
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
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_price(mut self, price: PriceTable) -> Self {
        self.price = Some(price);
        self
    }
}

#[async_trait]
trait MessagesTransport: Send + Sync {
    async fn create(&self, request: &MessagesRequest) -> Result<MessagesResponse, MessagesApiError>;
}

#[async_trait]
impl MessagesTransport for MessagesClient {
    async fn create(&self, request: &MessagesRequest) -> Result<MessagesResponse, MessagesApiError> {
        MessagesClient::create(self, request).await
    }
}

/// `ModelProvider` adapter for the messages endpoint.
pub struct MessagesProvider {
    transport: Arc<dyn MessagesTransport>,
    max_tokens: u32,
    price: Option<PriceTable>,
}

impl MessagesProvider {
    pub fn new(config: MessagesProviderConfig) -> Result<Self, ProviderInitError> {
        let mut client_config = MessagesClientConfig::new(config.api_key.clone());
        if let Some(base_url) = &config.base_url {
            client_config = client_config.with_base_url(base_url.clone());
        }
        if let Some(timeout) = config.timeout {
            client_config = client_config.with_timeout(timeout);
        }

        let client = MessagesClient::new(client_config).map_err(|error| {
            ProviderInitError::new(format!("Failed to initialize anthropic provider: {error}"))
        })?;

        Ok(Self {
            transport: Arc::new(client),
            max_tokens: config.max_tokens,
            price: config.price,
        })
    }

    fn price_for(&self, model: &str) -> PriceTable {
        self.price
            .or_else(|| PriceTable::for_model(model))
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn with_transport_for_tests(transport: Arc<dyn MessagesTransport>) -> Self {
        Self {
            transport,
            max_tokens: DEFAULT_MAX_TOKENS,
            price: None,
        }
    }
}

#[async_trait]
impl ModelProvider for MessagesProvider {
    fn provider_id(&self) -> &'static str {
        MESSAGES_PROVIDER_ID
    }

    async fn run(
        &self,
        request: RunRequest,
        usage: &mut dyn UsageRecorder,
        emit: EventSink<'_>,
    ) -> Result<RunOutcome, ProviderError> {
        let budget = thinking_budget(request.reasoning_effort);
        let max_tokens = match budget {
            Some(budget) => self.max_tokens.max(budget + ANSWER_HEADROOM_TOKENS),
            None => self.max_tokens,
        };

        let mut conversation = MessagesConversation {
            transport: self.transport.as_ref(),
            request: &request,
            price: self.price_for(&request.model),
            max_tokens,
            thinking: budget.map(|budget_tokens| ThinkingConfig::Enabled { budget_tokens }),
            extra_round_used: false,
            messages: vec![Message::user_text(request.prompt.clone())],
        };

        run_conversation(&mut conversation, &request, usage, emit).await
    }
}

struct MessagesConversation<'a> {
    transport: &'a dyn MessagesTransport,
    request: &'a RunRequest,
    price: PriceTable,
    max_tokens: u32,
    thinking: Option<ThinkingConfig>,
    /// The thinking-driven extra round is granted once per run.
    extra_round_used: bool,
    messages: Vec<Message>,
}

#[async_trait]
impl<'a> Conversation for MessagesConversation<'a> {
    async fn next_round(&mut self) -> Result<Round, ProviderError> {
        let payload = MessagesRequest {
            model: self.request.model.clone(),
            max_tokens: self.max_tokens,
            system: self.request.system.clone(),
            messages: self.messages.clone(),
            tools: self
                .request
                .tools
                .definitions()
                .into_iter()
                .map(ToolSpec::from)
                .collect(),
            thinking: self.thinking,
        };

        let response = self.transport.create(&payload).await?;
        debug!(
            session_id = %self.request.session_id,
            message_id = %response.id,
            stop_reason = response.stop_reason.as_deref().unwrap_or(""),
            "messages round received"
        );

        let mut round = Round {
            usage: RoundUsage::priced(
                response.usage.input_tokens,
                response.usage.output_tokens,
                &self.price,
            ),
            ..Round::default()
        };
        for block in &response.content {
            match block {
                ContentBlock::Thinking { thinking, .. } => round.reasoning.push(thinking.clone()),
                ContentBlock::Text { text } => round.text.push_str(text),
                ContentBlock::ToolUse { id, name, input } => round
                    .tool_calls
                    .push(ToolCallRequest::new(id.clone(), name.clone(), input.clone())),
                _ => {}
            }
        }
        round.keep_open = self.thinking.is_some() && !self.extra_round_used && round.tool_calls.is_empty();

        self.messages.push(Message {
            role: Role::Assistant,
            content: response
                .content
                .into_iter()
                .filter(|block| !matches!(block, ContentBlock::Unknown))
                .collect(),
        });

        Ok(round)
    }

    fn push_tool_replies(&mut self, replies: Vec<ToolReply>) {
        if replies.is_empty() {
            self.extra_round_used = true;
            self.messages.push(Message::user_text(CONTINUE_PROMPT));
            return;
        }

        self.messages.push(Message {
            role: Role::User,
            content: replies
                .into_iter()
                .map(|reply| ContentBlock::ToolResult {
                    tool_use_id: reply.call_id,
                    content: reply.content,
                    is_error: reply.is_error,
                })
                .collect(),
        });
    }
}
