//! Harmony implementation of the shared `agent_provider` contract.
//!
//! Every round re-encodes the whole exchange into one transcript, sends it to
//! a raw completion endpoint, and decodes the new text back into messages.

pub mod completions;

use std::sync::Arc;
use std::time::Duration;

use agent_provider::{
    run_conversation, Conversation, EventSink, ModelProvider, PriceTable, ProviderError,
    ProviderInitError, Round, RoundUsage, RunOutcome, RunRequest, ToolCallRequest, ToolReply,
    UsageRecorder,
};
use async_trait::async_trait;
use harmony::tokens::STOP_SEQUENCES;
use harmony::{parse_completion, render_developer, render_prompt, render_system, HarmonyMessage, Role};
use serde_json::Value;
use tracing::debug;

use crate::completions::{
    CompletionRequest, CompletionResponse, CompletionsClient, CompletionsConfig, CompletionsError,
};

/// Stable provider identifier used by the provider registry.
pub const HARMONY_PROVIDER_ID: &str = "harmony";

pub const DEFAULT_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone, PartialEq)]
pub struct HarmonyProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub max_tokens: u32,
    pub price: Option<PriceTable>,
}

impl Default for HarmonyProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            price: None,
        }
    }
}

impl HarmonyProviderConfig {
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
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
trait CompletionTransport: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionsError>;
}

#[async_trait]
impl CompletionTransport for CompletionsClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionsError> {
        CompletionsClient::complete(self, request).await
    }
}

pub struct HarmonyProvider {
    transport: Arc<dyn CompletionTransport>,
    max_tokens: u32,
    price: Option<PriceTable>,
}

impl HarmonyProvider {
    pub fn new(config: HarmonyProviderConfig) -> Result<Self, ProviderInitError> {
        let mut client_config = CompletionsConfig {
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            ..CompletionsConfig::default()
        };
        if let Some(base_url) = &config.base_url {
            client_config.base_url = base_url.clone();
        }

        let client = CompletionsClient::new(client_config).map_err(|error| {
            ProviderInitError::new(format!("Failed to initialize harmony provider: {error}"))
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
    fn with_transport_for_tests(transport: Arc<dyn CompletionTransport>) -> Self {
        Self {
            transport,
            max_tokens: DEFAULT_MAX_TOKENS,
            price: None,
        }
    }
}

#[async_trait]
impl ModelProvider for HarmonyProvider {
    fn provider_id(&self) -> &'static str {
        HARMONY_PROVIDER_ID
    }

    async fn run(
        &self,
        request: RunRequest,
        usage: &mut dyn UsageRecorder,
        emit: EventSink<'_>,
    ) -> Result<RunOutcome, ProviderError> {
        let transcript = vec![
            render_system(request.reasoning_effort.unwrap_or_default()),
            render_developer(&request.system, &request.tools.definitions()),
            HarmonyMessage::new(Role::User, request.prompt.clone()),
        ];
        let mut conversation = HarmonyConversation {
            transport: self.transport.as_ref(),
            request: &request,
            price: self.price_for(&request.model),
            max_tokens: self.max_tokens,
            transcript,
            rounds: 0,
        };

        run_conversation(&mut conversation, &request, usage, emit).await
    }
}

struct HarmonyConversation<'a> {
    transport: &'a dyn CompletionTransport,
    request: &'a RunRequest,
    price: PriceTable,
    max_tokens: u32,
    transcript: Vec<HarmonyMessage>,
    rounds: usize,
}

#[async_trait]
impl<'a> Conversation for HarmonyConversation<'a> {
    async fn next_round(&mut self) -> Result<Round, ProviderError> {
        let payload = CompletionRequest {
            model: self.request.model.clone(),
            prompt: render_prompt(&self.transcript),
            max_tokens: self.max_tokens,
            stop: STOP_SEQUENCES.iter().map(ToString::to_string).collect(),
            skip_special_tokens: false,
        };

        let response = self.transport.complete(&payload).await?;
        let messages = parse_completion(response.text()?)
            .map_err(|error| ProviderError::decode(error.to_string()))?;
        self.rounds += 1;
        debug!(
            session_id = %self.request.session_id,
            completion_id = %response.id,
            messages = messages.len(),
            "harmony round decoded"
        );

        let mut round = Round {
            usage: RoundUsage::priced(
                response.usage.prompt_tokens,
                response.usage.completion_tokens,
                &self.price,
            ),
            ..Round::default()
        };
        let mut text = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            if let Some(tool_name) = message.tool_name() {
                round.tool_calls.push(ToolCallRequest::new(
                    format!("call_{}_{index}", self.rounds),
                    tool_name,
                    parse_arguments(&message.content),
                ));
            } else if message.is_analysis() {
                round.reasoning.push(message.content.clone());
            } else if message.is_visible_text() {
                text.push(message.content.as_str());
            }
        }
        round.text = text.join("\n");

        self.transcript.extend(messages);
        Ok(round)
    }

    fn push_tool_replies(&mut self, replies: Vec<ToolReply>) {
        self.transcript.extend(
            replies
                .into_iter()
                .map(|reply| HarmonyMessage::tool_output(&reply.tool_name, reply.content)),
        );
    }
}

fn parse_arguments(content: &str) -> Value {
    if content.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(content).unwrap_or_else(|_| Value::String(content.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Mutex, MutexGuard};

    use agent_provider::{BudgetExceeded, ReasoningEffort, RunEvent, Tool, ToolError, ToolSet};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::completions::{CompletionChoice, CompletionUsage};

    fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    struct FakeTransport {
        prompts: Mutex<Vec<CompletionRequest>>,
        completions: Mutex<VecDeque<Result<CompletionResponse, CompletionsError>>>,
    }

    impl FakeTransport {
        fn scripted(texts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                completions: Mutex::new(texts.iter().map(|text| Ok(completion(text))).collect()),
            })
        }

        fn prompts(&self) -> Vec<CompletionRequest> {
            lock_unpoisoned(&self.prompts).clone()
        }
    }

    #[async_trait]
    impl CompletionTransport for FakeTransport {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionsError> {
            lock_unpoisoned(&self.prompts).push(request.clone());
            lock_unpoisoned(&self.completions)
                .pop_front()
                .expect("fake completion should be scripted for every round")
        }
    }

    fn completion(text: &str) -> CompletionResponse {
        CompletionResponse {
            id: "cmpl".to_string(),
            choices: vec![CompletionChoice {
                text: text.to_string(),
                finish_reason: Some("stop".to_string()),
            }],
            usage: CompletionUsage {
                prompt_tokens: 200,
                completion_tokens: 20,
            },
        }
    }

    #[derive(Default)]
    struct Ledger {
        rounds: Vec<RoundUsage>,
    }

    impl UsageRecorder for Ledger {
        fn record(&mut self, usage: RoundUsage) -> Result<(), BudgetExceeded> {
            self.rounds.push(usage);
            Ok(())
        }
    }

    struct Shell;

    #[async_trait]
    impl Tool for Shell {
        fn name(&self) -> &str {
            "shell"
        }

        fn description(&self) -> &str {
            "Runs a command"
        }

        fn parameters(&self) -> Value {
            json!({ "type": "object", "properties": { "command": { "type": "string" } } })
        }

        async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
            Ok(format!("ran {}", arguments["command"].as_str().unwrap_or_default()))
        }
    }

    async fn run(
        provider: &HarmonyProvider,
        request: RunRequest,
    ) -> (Result<RunOutcome, ProviderError>, Vec<RunEvent>, Ledger) {
        let mut events = Vec::new();
        let mut ledger = Ledger::default();
        let result = provider
            .run(request, &mut ledger, &mut |event| events.push(event))
            .await;
        (result, events, ledger)
    }

    fn request() -> RunRequest {
        RunRequest::new("s", "gpt-oss-120b", "Work carefully.", "list files")
            .with_tools(ToolSet::new().with(Shell))
            .with_reasoning_effort(ReasoningEffort::High)
    }

    #[tokio::test]
    async fn tool_call_round_then_final_answer() {
        let transport = FakeTransport::scripted(&[
            "<|channel|>analysis<|message|>Run ls.<|end|><|start|>assistant<|channel|>commentary to=functions.shell <|constrain|>json<|message|>{\"command\":\"ls\"}",
            "<|channel|>final<|message|>Saw the files.",
        ]);
        let provider = HarmonyProvider::with_transport_for_tests(transport.clone());

        let (result, events, ledger) = run(&provider, request()).await;
        let outcome = result.expect("run");

        assert_eq!(outcome.text, "Saw the files.");
        assert_eq!(outcome.rounds, 2);
        assert!(matches!(&events[0], RunEvent::Reasoning { text, .. } if text == "Run ls."));
        assert!(matches!(&events[1], RunEvent::ToolCall { tool_name, arguments, .. }
            if tool_name == "shell" && arguments == &json!({ "command": "ls" })));
        assert!(matches!(&events[2], RunEvent::ToolResult { output, .. } if output == "ran ls"));

        let prompts = transport.prompts();
        assert!(prompts[0].prompt.contains("Reasoning: high"));
        assert!(prompts[0].prompt.contains("# Instructions\n\nWork carefully."));
        assert!(prompts[0].prompt.ends_with("<|start|>user<|message|>list files<|end|><|start|>assistant"));
        assert_eq!(prompts[0].stop, vec!["<|return|>".to_string(), "<|call|>".to_string()]);
        assert!(prompts[1].prompt.ends_with(
            "<|message|>{\"command\":\"ls\"}<|call|><|start|>functions.shell to=assistant<|channel|>commentary<|message|>ran ls<|end|><|start|>assistant"
        ));

        let price = PriceTable::for_model("gpt-oss-120b").expect("price");
        assert_eq!(ledger.rounds[1].cost, price.cost(200, 20));
    }

    #[tokio::test]
    async fn constrain_routed_call_reaches_the_tool() {
        let transport = FakeTransport::scripted(&[
            "<|channel|>commentary to=<|constrain|>shell<|message|>{\"command\":\"pwd\"}<|call|>",
            "<|channel|>final<|message|>ok",
        ]);
        let provider = HarmonyProvider::with_transport_for_tests(transport);

        let (result, events, _) = run(&provider, request()).await;

        assert_eq!(result.expect("run").text, "ok");
        assert!(events
            .iter()
            .any(|event| matches!(event, RunEvent::ToolResult { output, .. } if output == "ran pwd")));
    }

    #[tokio::test]
    async fn visible_text_joins_final_and_commentary_and_skips_other_recipients() {
        let transport = FakeTransport::scripted(&[
            "<|channel|>commentary<|message|>Checking the tree.<|end|><|start|>assistant to=browser.search<|channel|>commentary<|message|>{\"query\":\"rust\"}<|end|><|start|>assistant<|channel|>final<|message|>All good.",
        ]);
        let provider = HarmonyProvider::with_transport_for_tests(transport);

        let (result, events, _) = run(&provider, request()).await;
        let outcome = result.expect("run");

        assert_eq!(outcome.text, "Checking the tree.\nAll good.");
        assert!(!events
            .iter()
            .any(|event| matches!(event, RunEvent::ToolCall { .. } | RunEvent::ToolError { .. })));
    }

    #[tokio::test]
    async fn undecodable_completion_is_fatal() {
        let transport = FakeTransport::scripted(&["<|channel|>final no message marker"]);
        let provider = HarmonyProvider::with_transport_for_tests(transport);

        let (result, events, ledger) = run(&provider, request()).await;

        assert!(matches!(result, Err(ProviderError::Decode(_))));
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], RunEvent::Error { .. }));
        assert!(ledger.rounds.is_empty());
    }

    #[tokio::test]
    async fn unknown_function_is_fed_back_as_tool_error() {
        let transport = FakeTransport::scripted(&[
            "<|channel|>commentary to=functions.grep <|constrain|>json<|message|>{}",
            "<|channel|>final<|message|>fine",
        ]);
        let provider = HarmonyProvider::with_transport_for_tests(transport.clone());

        let (result, events, _) = run(&provider, request()).await;

        assert_eq!(result.expect("run").text, "fine");
        assert!(events.iter().any(|event| matches!(
            event,
            RunEvent::ToolError { tool_name, error, .. } if tool_name == "grep" && error == "tool 'grep' not found"
        )));
        assert!(transport.prompts()[1]
            .prompt
            .contains("<|start|>functions.grep to=assistant<|channel|>commentary<|message|>Error: tool 'grep' not found<|end|>"));
    }
}
