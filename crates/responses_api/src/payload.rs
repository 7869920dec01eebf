use agent_provider::{ReasoningEffort, ToolDefinition, Verbosity};
use serde::Serialize;
use serde_json::Value;

/// One input item sent to the responses endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message { role: String, content: String },
    FunctionCallOutput { call_id: String, output: String },
}

impl InputItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self::Message {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn function_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<ToolDefinition> for FunctionTool {
    fn from(definition: ToolDefinition) -> Self {
        Self {
            kind: "function",
            name: definition.name,
            description: definition.description,
            parameters: definition.input_schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningConfig {
    pub effort: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextConfig {
    pub verbosity: String,
}

/// Request body for one responses round.
///
/// `store` stays on so the server keeps the response for chaining through
/// `previous_response_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    pub store: bool,
    pub stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    pub parallel_tool_calls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl ResponsesRequest {
    pub fn new(model: impl Into<String>, input: Vec<InputItem>) -> Self {
        Self {
            model: model.into(),
            instructions: None,
            input,
            previous_response_id: None,
            store: true,
            stream: true,
            tools: Vec::new(),
            tool_choice: None,
            parallel_tool_calls: false,
            reasoning: None,
            text: None,
            max_output_tokens: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        self.instructions = (!instructions.trim().is_empty()).then_some(instructions);
        self
    }

    pub fn with_previous_response_id(mut self, id: Option<String>) -> Self {
        self.previous_response_id = id;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools.into_iter().map(FunctionTool::from).collect();
        self.tool_choice = (!self.tools.is_empty()).then(|| "auto".to_string());
        self
    }

    pub fn with_reasoning_effort(mut self, effort: Option<ReasoningEffort>) -> Self {
        self.reasoning = effort.map(|effort| ReasoningConfig {
            effort: effort.as_str().to_string(),
            summary: "auto".to_string(),
        });
        self
    }

    pub fn with_verbosity(mut self, verbosity: Option<Verbosity>) -> Self {
        self.text = verbosity.map(|verbosity| TextConfig {
            verbosity: verbosity.as_str().to_string(),
        });
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: Option<u32>) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }
}
