//! Deterministic mock implementation of the shared `agent_provider` contract.
//!
//! This crate contains no transport/protocol logic. Rounds are scripted up
//! front and consumed in order across every run the provider serves, so one
//! instance can stand in for a whole multi-phase session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use agent_provider::{
    run_conversation, Conversation, EventSink, ModelProvider, PriceTable, ProviderError,
    ReasoningEffort, Round, RoundUsage, RunOutcome, RunRequest, ToolCallRequest, ToolReply,
    UsageRecorder,
};
use async_trait::async_trait;
use serde_json::Value;

/// Stable provider identifier used for explicit selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Text returned once the script runs out.
pub const FALLBACK_TEXT: &str = "Done.";

/// One scripted vendor round.
#[derive(Debug, Clone, PartialEq)]
pub enum MockRound {
    Reply {
        reasoning: Vec<String>,
        text: String,
        tool_calls: Vec<(String, Value)>,
        input_tokens: u64,
        output_tokens: u64,
    },
    /// Fails the round with a transport error.
    Fail(String),
}

impl MockRound {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Reply {
            reasoning: Vec::new(),
            text: text.into(),
            tool_calls: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    #[must_use]
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::text("").and_tool_call(name, arguments)
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    #[must_use]
    pub fn and_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
        if let Self::Reply { tool_calls, .. } = &mut self {
            tool_calls.push((name.into(), arguments));
        }
        self
    }

    #[must_use]
    pub fn with_reasoning(mut self, text: impl Into<String>) -> Self {
        if let Self::Reply { reasoning, .. } = &mut self {
            reasoning.push(text.into());
        }
        self
    }

    #[must_use]
    pub fn with_usage(mut self, input: u64, output: u64) -> Self {
        if let Self::Reply {
            input_tokens,
            output_tokens,
            ..
        } = &mut self
        {
            *input_tokens = input;
            *output_tokens = output;
        }
        self
    }
}

/// What the provider saw for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRun {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub tool_names: Vec<String>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub early_return_tool: Option<String>,
    pub max_steps: Option<usize>,
}

/// Deterministic provider used by `coding_agent` tests.
#[derive(Debug)]
pub struct MockProvider {
    rounds: Mutex<VecDeque<MockRound>>,
    runs: Mutex<Vec<RecordedRun>>,
    replies: Mutex<Vec<ToolReply>>,
    next_call_id: AtomicUsize,
    price: PriceTable,
}

impl MockProvider {
    #[must_use]
    pub fn new(rounds: Vec<MockRound>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            runs: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
            next_call_id: AtomicUsize::new(1),
            price: PriceTable::default(),
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: PriceTable) -> Self {
        self.price = price;
        self
    }

    /// Appends rounds to the end of the script.
    pub fn push_rounds(&self, rounds: impl IntoIterator<Item = MockRound>) {
        lock_unpoisoned(&self.rounds).extend(rounds);
    }

    #[must_use]
    pub fn runs(&self) -> Vec<RecordedRun> {
        lock_unpoisoned(&self.runs).clone()
    }

    /// Tool replies fed back to the model, in order.
    #[must_use]
    pub fn replies(&self) -> Vec<ToolReply> {
        lock_unpoisoned(&self.replies).clone()
    }

    #[must_use]
    pub fn remaining_rounds(&self) -> usize {
        lock_unpoisoned(&self.rounds).len()
    }

    fn next_round(&self) -> Result<Round, ProviderError> {
        let scripted = lock_unpoisoned(&self.rounds)
            .pop_front()
            .unwrap_or_else(|| MockRound::text(FALLBACK_TEXT));

        match scripted {
            MockRound::Fail(message) => Err(ProviderError::transport(message)),
            MockRound::Reply {
                reasoning,
                text,
                tool_calls,
                input_tokens,
                output_tokens,
            } => Ok(Round {
                reasoning,
                text,
                tool_calls: tool_calls
                    .into_iter()
                    .map(|(name, arguments)| {
                        let id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
                        ToolCallRequest::new(format!("mock-call-{id}"), name, arguments)
                    })
                    .collect(),
                usage: RoundUsage::priced(input_tokens, output_tokens, &self.price),
                keep_open: false,
            }),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_id(&self) -> &'static str {
        MOCK_PROVIDER_ID
    }

    async fn run(
        &self,
        request: RunRequest,
        usage: &mut dyn UsageRecorder,
        emit: EventSink<'_>,
    ) -> Result<RunOutcome, ProviderError> {
        lock_unpoisoned(&self.runs).push(RecordedRun {
            model: request.model.clone(),
            system: request.system.clone(),
            prompt: request.prompt.clone(),
            tool_names: request.tools.names(),
            reasoning_effort: request.reasoning_effort,
            early_return_tool: request.early_return_tool.clone(),
            max_steps: request.max_steps,
        });

        let mut conversation = MockConversation { provider: self };
        run_conversation(&mut conversation, &request, usage, emit).await
    }
}

struct MockConversation<'a> {
    provider: &'a MockProvider,
}

#[async_trait]
impl<'a> Conversation for MockConversation<'a> {
    async fn next_round(&mut self) -> Result<Round, ProviderError> {
        self.provider.next_round()
    }

    fn push_tool_replies(&mut self, replies: Vec<ToolReply>) {
        lock_unpoisoned(&self.provider.replies).extend(replies);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
