use agent_provider::{ReasoningEffort, Tool, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{parse_arguments, WRITE_PLAN_TOOL};

/// One todo as proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedTodo {
    pub description: String,
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanArgs {
    todos: Vec<PlannedTodo>,
}

/// Validates `write_plan` arguments and returns the proposed todos.
pub fn parse_plan(arguments: &Value) -> Result<Vec<PlannedTodo>, ToolError> {
    let args: PlanArgs = parse_arguments(WRITE_PLAN_TOOL, arguments.clone())?;
    if args.todos.is_empty() {
        return Err(ToolError::execution("plan must contain at least one todo"));
    }
    if let Some(position) = args
        .todos
        .iter()
        .position(|todo| todo.description.trim().is_empty())
    {
        return Err(ToolError::execution(format!(
            "todo {} has an empty description",
            position + 1
        )));
    }

    Ok(args
        .todos
        .into_iter()
        .map(|todo| PlannedTodo {
            description: todo.description.trim().to_string(),
            reasoning_effort: todo.reasoning_effort,
        })
        .collect())
}

/// Accepts the model's todo list. The session reads the proposal from the call itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct WritePlanTool;

#[async_trait]
impl Tool for WritePlanTool {
    fn name(&self) -> &str {
        WRITE_PLAN_TOOL
    }

    fn description(&self) -> &str {
        "Submit the ordered list of todos that will carry out the request."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "description": { "type": "string" },
                            "reasoning_effort": { "type": "string", "enum": ["low", "medium", "high"] }
                        },
                        "required": ["description"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let todos = parse_plan(&arguments)?;
        Ok(format!("Plan recorded with {} todo(s).", todos.len()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plan_is_trimmed_and_keeps_efforts() {
        let todos = parse_plan(&json!({
            "todos": [
                { "description": "  add flag ", "reasoning_effort": "low" },
                { "description": "write tests" }
            ]
        }))
        .expect("valid plan");

        assert_eq!(
            todos,
            vec![
                PlannedTodo {
                    description: "add flag".to_string(),
                    reasoning_effort: Some(ReasoningEffort::Low),
                },
                PlannedTodo {
                    description: "write tests".to_string(),
                    reasoning_effort: None,
                },
            ]
        );
    }

    #[test]
    fn empty_plans_and_descriptions_are_rejected() {
        assert_eq!(
            parse_plan(&json!({ "todos": [] })).expect_err("empty").to_string(),
            "plan must contain at least one todo"
        );
        assert_eq!(
            parse_plan(&json!({ "todos": [{ "description": "a" }, { "description": " " }] }))
                .expect_err("blank")
                .to_string(),
            "todo 2 has an empty description"
        );
        assert!(matches!(
            parse_plan(&json!({ "steps": [] })),
            Err(ToolError::MalformedArguments { .. })
        ));
    }

    #[tokio::test]
    async fn tool_reports_the_recorded_count() {
        let output = WritePlanTool
            .execute(json!({ "todos": [{ "description": "a" }, { "description": "b" }] }))
            .await
            .expect("valid plan");

        assert_eq!(output, "Plan recorded with 2 todo(s).");
    }
}
