use agent_provider::{ReasoningEffort, ToolDefinition};
use serde_json::Value;

use crate::message::{HarmonyMessage, Role};
use crate::tokens::{CALL, CHANNEL, CONSTRAIN, END, MESSAGE, START};

const SYSTEM_PREAMBLE: &str = "You are ChatGPT, a large language model trained by OpenAI.\nKnowledge cutoff: 2024-06";
const CHANNEL_RULES: &str = "# Valid channels: analysis, commentary, final. Channel must be included for every message.\nCalls to these tools must go to the commentary channel: 'functions'.";

/// System message carrying the reasoning level and channel rules.
pub fn render_system(effort: ReasoningEffort) -> HarmonyMessage {
    HarmonyMessage::new(
        Role::System,
        format!("{SYSTEM_PREAMBLE}\n\nReasoning: {effort}\n\n{CHANNEL_RULES}"),
    )
}

/// Developer message with the instructions and the `functions` namespace.
pub fn render_developer(instructions: &str, tools: &[ToolDefinition]) -> HarmonyMessage {
    let mut sections = Vec::new();
    if !instructions.trim().is_empty() {
        sections.push(format!("# Instructions\n\n{}", instructions.trim()));
    }
    if !tools.is_empty() {
        let declarations: Vec<String> = tools.iter().map(render_tool).collect();
        sections.push(format!(
            "# Tools\n\n## functions\n\nnamespace functions {{\n\n{}\n\n}} // namespace functions",
            declarations.join("\n\n")
        ));
    }
    HarmonyMessage::new(Role::Developer, sections.join("\n\n"))
}

/// Renders one message with its terminator.
///
/// Assistant messages routed to a recipient end with `<|call|>`; everything
/// else, final answers included, ends with `<|end|>` when replayed as history.
pub fn render_message(message: &HarmonyMessage) -> String {
    let mut header = message.role.as_str().to_string();
    let is_tool_output = matches!(message.role, Role::Tool(_));

    if is_tool_output {
        if let Some(recipient) = &message.recipient {
            header.push_str(&format!(" to={recipient}"));
        }
    }
    if let Some(channel) = &message.channel {
        header.push_str(CHANNEL);
        header.push_str(channel);
    }
    if !is_tool_output {
        if let Some(recipient) = &message.recipient {
            header.push_str(&format!(" to={recipient}"));
        }
    }
    if let Some(content_type) = &message.content_type {
        header.push_str(&format!(" {CONSTRAIN}{content_type}"));
    }

    let terminator = if message.role == Role::Assistant && message.recipient.is_some() {
        CALL
    } else {
        END
    };
    format!("{START}{header}{MESSAGE}{}{terminator}", message.content)
}

/// Renders the transcript and opens the next assistant turn.
pub fn render_prompt(messages: &[HarmonyMessage]) -> String {
    let mut prompt: String = messages.iter().map(render_message).collect();
    prompt.push_str(START);
    prompt.push_str("assistant");
    prompt
}

fn render_tool(tool: &ToolDefinition) -> String {
    let mut out = String::new();
    for line in tool.description.lines().filter(|line| !line.trim().is_empty()) {
        out.push_str(&format!("// {}\n", line.trim()));
    }

    let has_properties = tool
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|properties| !properties.is_empty());
    if has_properties {
        out.push_str(&format!(
            "type {} = (_: {}) => any;",
            tool.name,
            render_object(&tool.input_schema, 0)
        ));
    } else {
        out.push_str(&format!("type {} = () => any;", tool.name));
    }
    out
}

fn render_object(schema: &Value, depth: usize) -> String {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return "object".to_string();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let indent = "  ".repeat(depth);

    let mut out = String::from("{\n");
    for (name, property) in properties {
        if let Some(description) = property.get("description").and_then(Value::as_str) {
            out.push_str(&format!("{indent}// {description}\n"));
        }
        let optional = if required.contains(&name.as_str()) { "" } else { "?" };
        out.push_str(&format!(
            "{indent}{name}{optional}: {},\n",
            render_type(property, depth + 1)
        ));
    }
    out.push_str(&format!("{}}}", "  ".repeat(depth.saturating_sub(1))));
    out
}

fn render_type(schema: &Value, depth: usize) -> String {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        let variants: Vec<String> = values.iter().map(Value::to_string).collect();
        if !variants.is_empty() {
            return variants.join(" | ");
        }
    }

    match schema.get("type").and_then(Value::as_str) {
        Some("string") => "string".to_string(),
        Some("integer") | Some("number") => "number".to_string(),
        Some("boolean") => "boolean".to_string(),
        Some("array") => match schema.get("items") {
            Some(items) => format!("{}[]", render_type(items, depth)),
            None => "any[]".to_string(),
        },
        Some("object") => render_object(schema, depth),
        _ => "any".to_string(),
    }
}
