use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized event emitted by a provider run, in production order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RunEvent {
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
}

impl RunEvent {
    /// Returns the session identifier associated with this event.
    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::Text { session_id, .. }
            | Self::Reasoning { session_id, .. }
            | Self::ToolCall { session_id, .. }
            | Self::ToolResult { session_id, .. }
            | Self::ToolError { session_id, .. }
            | Self::Error { session_id, .. } => session_id,
        }
    }

    /// Returns the tool name for tool lifecycle events.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolCall { tool_name, .. }
            | Self::ToolResult { tool_name, .. }
            | Self::ToolError { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }
}
