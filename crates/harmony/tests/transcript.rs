use agent_provider::{ReasoningEffort, ToolDefinition};
use harmony::{
    parse_completion, parse_transcript, render_developer, render_message, render_prompt,
    render_system, HarmonyMessage, Role,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn rendered_history_parses_back_into_the_same_messages() {
    let history = vec![
        HarmonyMessage::new(Role::User, "list the files"),
        HarmonyMessage::new(Role::Assistant, "I should run ls.").with_channel("analysis"),
        HarmonyMessage::tool_call("shell", r#"{"command":"ls"}"#),
        HarmonyMessage::tool_output("shell", "Cargo.toml\nsrc"),
        HarmonyMessage::new(Role::Assistant, "Two entries.").with_channel("final"),
    ];

    let rendered: String = history.iter().map(render_message).collect();
    let parsed = parse_transcript(&rendered).expect("parse rendered transcript");

    assert_eq!(parsed, history);
}

#[test]
fn prompt_continuation_decodes_against_the_open_turn() {
    let tools = vec![ToolDefinition {
        name: "write_plan".to_string(),
        description: "Record the plan".to_string(),
        input_schema: json!({ "type": "object", "properties": { "todos": { "type": "array" } } }),
    }];
    let prompt = render_prompt(&[
        render_system(ReasoningEffort::Medium),
        render_developer("Plan the work.", &tools),
        HarmonyMessage::new(Role::User, "add a flag"),
    ]);
    assert!(prompt.ends_with("<|start|>assistant"));
    assert!(prompt.contains("Reasoning: medium"));
    assert!(prompt.contains("type write_plan = (_: {\ntodos?: any[],\n}) => any;"));

    let completion = concat!(
        "<|channel|>analysis<|message|>One todo is enough.<|end|>",
        "<|start|>assistant<|channel|>commentary to=functions.write_plan <|constrain|>json",
        "<|message|>{\"todos\":[]}"
    );
    let messages = parse_completion(completion).expect("decode completion");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].tool_name().as_deref(), Some("write_plan"));
}
