//! Provider-neutral contract for one tool-calling model conversation.
//!
//! This crate defines the pieces every vendor adapter shares: the normalized
//! [`RunEvent`] stream, the [`Tool`] call contract, per-round usage recording,
//! price tables, and [`run_conversation`], the round loop each adapter drives
//! through its own [`Conversation`] implementation. It contains no transport
//! code and no orchestration of multiple runs.

mod conversation;
mod effort;
mod error;
mod events;
mod request;
pub mod retry;
mod tool;
mod usage;

use async_trait::async_trait;

pub use conversation::{dispatch_tool_call, run_conversation, Conversation, Round, ToolReply};
pub use effort::{ReasoningEffort, Verbosity};
pub use error::{ProviderError, ProviderInitError};
pub use events::RunEvent;
pub use request::{RunOutcome, RunRequest};
pub use tool::{Tool, ToolCallRequest, ToolDefinition, ToolError, ToolSet};
pub use usage::{BudgetExceeded, PriceTable, RoundUsage, UsageRecorder};

/// Sink receiving normalized events in emission order.
pub type EventSink<'a> = &'a mut (dyn FnMut(RunEvent) + Send);

/// Provider interface for executing one logical request.
#[async_trait]
pub trait ModelProvider: Send + Sync + 'static {
    /// Stable provider identifier used for selection.
    fn provider_id(&self) -> &'static str;

    /// Runs the conversation loop for `request`.
    ///
    /// Events are emitted through `emit` in production order. Every vendor
    /// round is reported to `usage` before its events are emitted; a budget
    /// refusal unwinds immediately without an `error` event. Any other fatal
    /// failure emits exactly one [`RunEvent::Error`] before returning `Err`.
    async fn run(
        &self,
        request: RunRequest,
        usage: &mut dyn UsageRecorder,
        emit: EventSink<'_>,
    ) -> Result<RunOutcome, ProviderError>;
}
