use crate::routing::tool_recipient;
use crate::tokens::{ANALYSIS_CHANNEL, COMMENTARY_CHANNEL, FINAL_CHANNEL};
use crate::HarmonyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
    /// Tool output; the author is the full name, e.g. `functions.shell`.
    Tool(String),
}

impl Role {
    pub fn parse(value: &str) -> Result<Self, HarmonyError> {
        match value {
            "system" => Ok(Self::System),
            "developer" => Ok(Self::Developer),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other if other.starts_with("functions.") => Ok(Self::Tool(other.to_string())),
            other => Err(HarmonyError::UnknownRole(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::Developer => "developer",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarmonyMessage {
    pub role: Role,
    pub channel: Option<String>,
    /// Routing target from the `to=` field, cut at any channel marker.
    pub recipient: Option<String>,
    pub content_type: Option<String>,
    pub content: String,
}

impl HarmonyMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            channel: None,
            recipient: None,
            content_type: None,
            content: content.into(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Assistant call to `functions.<name>` with JSON arguments.
    pub fn tool_call(name: &str, arguments: impl Into<String>) -> Self {
        Self::new(Role::Assistant, arguments)
            .with_channel(COMMENTARY_CHANNEL)
            .with_recipient(format!("functions.{name}"))
            .with_content_type("json")
    }

    /// Output of `functions.<name>` addressed back to the assistant.
    pub fn tool_output(name: &str, output: impl Into<String>) -> Self {
        Self::new(Role::Tool(format!("functions.{name}")), output)
            .with_channel(COMMENTARY_CHANNEL)
            .with_recipient("assistant")
    }

    /// Tool name when this is an assistant message routed to a function.
    pub fn tool_name(&self) -> Option<String> {
        if self.role != Role::Assistant {
            return None;
        }
        self.recipient.as_deref().and_then(tool_recipient)
    }

    pub fn is_analysis(&self) -> bool {
        self.channel.as_deref() == Some(ANALYSIS_CHANNEL)
    }

    pub fn is_final(&self) -> bool {
        self.channel.as_deref() == Some(FINAL_CHANNEL)
    }

    /// Unaddressed assistant text on the `final` or `commentary` channel.
    pub fn is_visible_text(&self) -> bool {
        self.role == Role::Assistant
            && self.recipient.is_none()
            && matches!(
                self.channel.as_deref(),
                None | Some(FINAL_CHANNEL) | Some(COMMENTARY_CHANNEL)
            )
    }
}
