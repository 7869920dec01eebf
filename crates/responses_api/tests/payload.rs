use agent_provider::{ReasoningEffort, ToolDefinition, Verbosity};
use responses_api::{InputItem, ResponsesRequest};
use serde_json::{json, Value};

#[test]
fn first_round_payload_shape() {
    let request = ResponsesRequest::new("gpt-5", vec![InputItem::user("hi")])
        .with_instructions("be terse");
    let body = serde_json::to_value(&request).expect("serialize payload");

    assert_eq!(body["model"], "gpt-5");
    assert_eq!(body["instructions"], "be terse");
    assert_eq!(body["input"], json!([{ "type": "message", "role": "user", "content": "hi" }]));
    assert_eq!(body["store"], Value::Bool(true));
    assert_eq!(body["stream"], Value::Bool(true));
    assert_eq!(body["parallel_tool_calls"], Value::Bool(false));
    assert!(body.get("previous_response_id").is_none());
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());
    assert!(body.get("reasoning").is_none());
    assert!(body.get("text").is_none());
}

#[test]
fn continuation_payload_sends_only_function_outputs() {
    let request = ResponsesRequest::new(
        "gpt-5",
        vec![InputItem::function_output("call_1", "file.txt")],
    )
    .with_previous_response_id(Some("resp_1".to_string()));
    let body = serde_json::to_value(&request).expect("serialize payload");

    assert_eq!(body["previous_response_id"], "resp_1");
    assert_eq!(
        body["input"],
        json!([{ "type": "function_call_output", "call_id": "call_1", "output": "file.txt" }])
    );
}

#[test]
fn tools_and_hints_are_serialized_when_set() {
    let request = ResponsesRequest::new("gpt-5", vec![InputItem::user("hi")])
        .with_tools(vec![ToolDefinition {
            name: "shell".to_string(),
            description: "Run a command".to_string(),
            input_schema: json!({ "type": "object" }),
        }])
        .with_reasoning_effort(Some(ReasoningEffort::High))
        .with_verbosity(Some(Verbosity::Low))
        .with_max_output_tokens(Some(2048));
    let body = serde_json::to_value(&request).expect("serialize payload");

    assert_eq!(
        body["tools"],
        json!([{
            "type": "function",
            "name": "shell",
            "description": "Run a command",
            "parameters": { "type": "object" }
        }])
    );
    assert_eq!(body["tool_choice"], "auto");
    assert_eq!(body["reasoning"], json!({ "effort": "high", "summary": "auto" }));
    assert_eq!(body["text"], json!({ "verbosity": "low" }));
    assert_eq!(body["max_output_tokens"], 2048);
}

#[test]
fn blank_instructions_are_omitted() {
    let request = ResponsesRequest::new("gpt-5", Vec::new()).with_instructions("  ");
    assert!(request.instructions.is_none());
}
