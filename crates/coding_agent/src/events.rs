use agent_provider::RunEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::todo::Todo;

/// Externally observable output of a session, in production order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    Text {
        session_id: String,
        text: String,
    },
    Reasoning {
        session_id: String,
        text: String,
    },
    ToolCall {
        session_id: String,
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolResult {
        session_id: String,
        call_id: String,
        tool_name: String,
        output: String,
    },
    ToolError {
        session_id: String,
        call_id: String,
        tool_name: String,
        error: String,
    },
    Error {
        session_id: String,
        message: String,
    },
    /// Full todo list after a plan change.
    Todos {
        session_id: String,
        todos: Vec<Todo>,
    },
    Completed(CompletionReport),
}

/// Terminal report of a session that ran to the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub session_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub steps: usize,
    pub duration_ms: u64,
    pub todos: Vec<Todo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Final narrative of the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl SessionEvent {
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Text { session_id, .. }
            | Self::Reasoning { session_id, .. }
            | Self::ToolCall { session_id, .. }
            | Self::ToolResult { session_id, .. }
            | Self::ToolError { session_id, .. }
            | Self::Error { session_id, .. }
            | Self::Todos { session_id, .. } => session_id,
            Self::Completed(report) => &report.session_id,
        }
    }

    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool_name, .. }
            | Self::ToolResult { tool_name, .. }
            | Self::ToolError { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Error { .. })
    }
}

impl From<RunEvent> for SessionEvent {
    fn from(event: RunEvent) -> Self {
        match event {
            RunEvent::Text { session_id, text } => Self::Text { session_id, text },
            RunEvent::Reasoning { session_id, text } => Self::Reasoning { session_id, text },
            RunEvent::ToolCall {
                session_id,
                call_id,
                tool_name,
                arguments,
            } => Self::ToolCall {
                session_id,
                call_id,
                tool_name,
                arguments,
            },
            RunEvent::ToolResult {
                session_id,
                call_id,
                tool_name,
                output,
            } => Self::ToolResult {
                session_id,
                call_id,
                tool_name,
                output,
            },
            RunEvent::ToolError {
                session_id,
                call_id,
                tool_name,
                error,
            } => Self::ToolError {
                session_id,
                call_id,
                tool_name,
                error,
            },
            RunEvent::Error {
                session_id,
                message,
            } => Self::Error {
                session_id,
                message,
            },
        }
    }
}
