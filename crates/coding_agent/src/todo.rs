use std::collections::BTreeSet;
use std::fmt;

use agent_provider::ReasoningEffort;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Context handed to planning and execution when no todo exists yet.
pub const EMPTY_PLAN_CONTEXT: &str = "No todos have been planned yet.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::InProgress => "[~]",
            Self::Completed => "[x]",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illegal status change. Todos only move forward, one state at a time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("todo '{description}' cannot move from {from} to {to}")]
pub struct TodoTransitionError {
    pub description: String,
    pub from: TodoStatus,
    pub to: TodoStatus,
}

/// One planned unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub description: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub paths: BTreeSet<String>,
}

impl Todo {
    #[must_use]
    pub fn new(description: impl Into<String>, reasoning_effort: ReasoningEffort) -> Self {
        Self {
            description: description.into(),
            context: String::new(),
            status: TodoStatus::Pending,
            reasoning_effort,
            summary: None,
            paths: BTreeSet::new(),
        }
    }

    pub fn start(&mut self) -> Result<(), TodoTransitionError> {
        self.transition(TodoStatus::Pending, TodoStatus::InProgress)
    }

    /// Marks the todo done and stores the final text of its execution.
    pub fn complete(&mut self, summary: impl Into<String>) -> Result<(), TodoTransitionError> {
        self.transition(TodoStatus::InProgress, TodoStatus::Completed)?;
        self.summary = Some(summary.into());
        Ok(())
    }

    pub fn merge_paths<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
    }

    fn transition(&mut self, from: TodoStatus, to: TodoStatus) -> Result<(), TodoTransitionError> {
        if self.status != from {
            return Err(TodoTransitionError {
                description: self.description.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Renders the plan as one line per todo.
#[must_use]
pub fn render_context(todos: &[Todo]) -> String {
    if todos.is_empty() {
        return EMPTY_PLAN_CONTEXT.to_string();
    }

    todos
        .iter()
        .enumerate()
        .map(|(index, todo)| {
            let mut line = format!(
                "{}. {} {}",
                index + 1,
                todo.status.glyph(),
                single_line(&todo.description)
            );
            if let Some(summary) = todo.summary.as_deref().filter(|summary| !summary.trim().is_empty()) {
                line.push_str(&format!(" ({})", single_line(summary)));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Re-renders the plan into every pending todo.
pub fn refresh_contexts(todos: &mut [Todo]) {
    let context = render_context(todos);
    for todo in todos
        .iter_mut()
        .filter(|todo| todo.status == TodoStatus::Pending)
    {
        todo.context.clone_from(&context);
    }
}

/// Index of the todo to run next: an interrupted one first, then the first pending.
#[must_use]
pub fn next_runnable(todos: &[Todo]) -> Option<usize> {
    todos
        .iter()
        .position(|todo| todo.status == TodoStatus::InProgress)
        .or_else(|| {
            todos
                .iter()
                .position(|todo| todo.status == TodoStatus::Pending)
        })
}

#[must_use]
pub fn in_progress_count(todos: &[Todo]) -> usize {
    todos
        .iter()
        .filter(|todo| todo.status == TodoStatus::InProgress)
        .count()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn completed(description: &str, summary: &str) -> Todo {
        let mut todo = Todo::new(description, ReasoningEffort::Medium);
        todo.start().expect("start");
        todo.complete(summary).expect("complete");
        todo
    }

    #[test]
    fn empty_plan_renders_sentinel() {
        assert_eq!(render_context(&[]), EMPTY_PLAN_CONTEXT);
    }

    #[test]
    fn context_has_one_numbered_line_per_todo() {
        let mut running = Todo::new("wire the parser", ReasoningEffort::High);
        running.start().expect("start");
        let todos = vec![
            completed("read the code", "found two\nmodules"),
            running,
            Todo::new("write   tests", ReasoningEffort::Low),
        ];

        let context = render_context(&todos);

        assert_eq!(context.lines().count(), todos.len());
        assert_eq!(
            context,
            "1. [x] read the code (found two modules)\n2. [~] wire the parser\n3. [ ] write tests"
        );
    }

    #[test]
    fn refresh_only_touches_pending_todos() {
        let mut todos = vec![completed("a", "done"), Todo::new("b", ReasoningEffort::Low)];
        refresh_contexts(&mut todos);

        assert!(todos[0].context.is_empty());
        assert_eq!(todos[1].context, "1. [x] a (done)\n2. [ ] b");
    }

    #[test]
    fn status_never_skips_or_reverts() {
        let mut todo = Todo::new("a", ReasoningEffort::Low);
        let error = todo.complete("early").expect_err("pending cannot complete");
        assert_eq!(error.to_string(), "todo 'a' cannot move from pending to completed");
        assert_eq!(todo.summary, None);

        todo.start().expect("start");
        todo.complete("done").expect("complete");
        assert!(todo.start().is_err());
        assert_eq!(todo.status, TodoStatus::Completed);
    }

    #[test]
    fn interrupted_todo_runs_before_pending_ones() {
        let mut resumed = Todo::new("second", ReasoningEffort::Low);
        resumed.start().expect("start");
        let todos = vec![Todo::new("first", ReasoningEffort::Low), resumed];

        assert_eq!(next_runnable(&todos), Some(1));
        assert_eq!(next_runnable(&[completed("x", "y")]), None);
    }

    #[test]
    fn todos_deserialize_with_defaults() {
        let todo: Todo = serde_json::from_str(r#"{"description":"fix typo"}"#).expect("todo");

        assert_eq!(todo.status, TodoStatus::Pending);
        assert_eq!(todo.reasoning_effort, ReasoningEffort::Medium);
        assert!(todo.paths.is_empty());
    }
}
