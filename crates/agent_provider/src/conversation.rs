use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::events::RunEvent;
use crate::request::{RunOutcome, RunRequest};
use crate::tool::{ToolCallRequest, ToolError, ToolSet};
use crate::usage::{RoundUsage, UsageRecorder};
use crate::EventSink;

/// One vendor round, normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Round {
    pub reasoning: Vec<String>,
    /// Complete assistant text of the round; never a fragment.
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: RoundUsage,
    /// The vendor signalled more work even though no tool was called.
    pub keep_open: bool,
}

/// Tool outcome fed back into the conversation for the next round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

/// Vendor-specific conversation state driven by [`run_conversation`].
#[async_trait]
pub trait Conversation: Send {
    /// Performs one vendor round trip from the current state.
    ///
    /// The implementation records the assistant side of the exchange in its
    /// own state before returning.
    async fn next_round(&mut self) -> Result<Round, ProviderError>;

    /// Appends the replies to the round just returned. Empty when the round
    /// was kept open without tool calls.
    fn push_tool_replies(&mut self, replies: Vec<ToolReply>);
}

/// Drives the shared round loop until the model stops calling tools, the
/// round limit is reached, or the early-return tool succeeds.
pub async fn run_conversation(
    conversation: &mut dyn Conversation,
    request: &RunRequest,
    usage: &mut dyn UsageRecorder,
    emit: EventSink<'_>,
) -> Result<RunOutcome, ProviderError> {
    let session_id = request.session_id.as_str();
    let mut last_text = String::new();
    let mut rounds = 0usize;

    loop {
        let round = match conversation.next_round().await {
            Ok(round) => round,
            Err(error) => return Err(fail(session_id, error, emit)),
        };
        rounds += 1;
        usage.record(round.usage)?;
        debug!(
            session_id,
            rounds,
            tool_calls = round.tool_calls.len(),
            input_tokens = round.usage.input_tokens,
            output_tokens = round.usage.output_tokens,
            "provider round completed"
        );

        for reasoning in round.reasoning.iter().filter(|text| !text.trim().is_empty()) {
            emit(RunEvent::Reasoning {
                session_id: session_id.to_string(),
                text: reasoning.clone(),
            });
        }

        if !round.text.trim().is_empty() {
            emit(RunEvent::Text {
                session_id: session_id.to_string(),
                text: round.text.clone(),
            });
            last_text = round.text;
        }

        if round.tool_calls.is_empty() {
            if round.keep_open && !request.round_limit_reached(rounds) {
                conversation.push_tool_replies(Vec::new());
                continue;
            }

            return Ok(RunOutcome {
                text: last_text,
                rounds,
                returned_early: false,
            });
        }

        let mut replies = Vec::with_capacity(round.tool_calls.len());
        for call in round.tool_calls {
            let reply = dispatch_tool_call(&request.tools, call, session_id, emit).await;
            if !reply.is_error && request.early_return_tool.as_deref() == Some(reply.tool_name.as_str()) {
                debug!(session_id, tool = %reply.tool_name, "early-return tool completed");
                return Ok(RunOutcome {
                    text: last_text,
                    rounds,
                    returned_early: true,
                });
            }
            replies.push(reply);
        }

        if request.round_limit_reached(rounds) {
            debug!(session_id, rounds, "round limit reached with tool calls pending");
            return Ok(RunOutcome {
                text: last_text,
                rounds,
                returned_early: false,
            });
        }

        conversation.push_tool_replies(replies);
    }
}

/// Emits `tool-call`, executes the tool, and emits `tool-result` or `tool-error`.
///
/// Failures never escape: they become an error reply for the model.
pub async fn dispatch_tool_call(
    tools: &ToolSet,
    call: ToolCallRequest,
    session_id: &str,
    emit: EventSink<'_>,
) -> ToolReply {
    emit(RunEvent::ToolCall {
        session_id: session_id.to_string(),
        call_id: call.call_id.clone(),
        tool_name: call.tool_name.clone(),
        arguments: call.arguments.clone(),
    });

    let result = match tools.get(&call.tool_name) {
        None => Err(ToolError::NotFound(call.tool_name.clone())),
        Some(_) if !call.arguments.is_object() => Err(ToolError::malformed(
            call.tool_name.clone(),
            "expected a JSON object",
        )),
        Some(tool) => tool.execute(call.arguments).await,
    };

    match result {
        Ok(output) => {
            emit(RunEvent::ToolResult {
                session_id: session_id.to_string(),
                call_id: call.call_id.clone(),
                tool_name: call.tool_name.clone(),
                output: output.clone(),
            });
            ToolReply {
                call_id: call.call_id,
                tool_name: call.tool_name,
                content: output,
                is_error: false,
            }
        }
        Err(error) => {
            let message = error.to_string();
            debug!(session_id, tool = %call.tool_name, %message, "tool call failed");
            emit(RunEvent::ToolError {
                session_id: session_id.to_string(),
                call_id: call.call_id.clone(),
                tool_name: call.tool_name.clone(),
                error: message.clone(),
            });
            ToolReply {
                call_id: call.call_id,
                tool_name: call.tool_name,
                content: format!("Error: {message}"),
                is_error: true,
            }
        }
    }
}

fn fail(session_id: &str, error: ProviderError, emit: EventSink<'_>) -> ProviderError {
    if !error.is_budget_exceeded() {
        warn!(session_id, %error, "provider run failed");
        emit(RunEvent::Error {
            session_id: session_id.to_string(),
            message: error.to_string(),
        });
    }
    error
}
