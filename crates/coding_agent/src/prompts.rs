//! Model configuration per orchestration phase.
//!
//! The session asks a [`ModelConfiguration`] for `{model, system, prompt,
//! provider, credential}` before every provider run and does not care how the
//! strings are produced. [`PromptedModels`] is the built-in implementation:
//! fixed templates filled from the phase context, routed to a configured
//! endpoint per phase.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::todo::{render_context, Todo, TodoStatus};
use crate::tools::{
    FILE_EDITOR_TOOL, READ_ONLY_SHELL_TOOL, SHELL_TOOL, WEB_FETCH_TOOL, WEB_SEARCH_TOOL,
    WRITE_PLAN_TOOL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Triage,
    AnalyzeProject,
    PlanTodos,
    ExecuteTodo,
    Summarize,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Triage,
        Phase::AnalyzeProject,
        Phase::PlanTodos,
        Phase::ExecuteTodo,
        Phase::Summarize,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::AnalyzeProject => "analyze_project",
            Self::PlanTodos => "plan_todos",
            Self::ExecuteTodo => "execute_todo",
            Self::Summarize => "summarize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state visible to the model configuration for one phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    pub phase: Phase,
    pub request: &'a str,
    pub working_directory: &'a Path,
    pub repository_context: Option<&'a str>,
    pub analysis: Option<&'a str>,
    pub todos: &'a [Todo],
    /// The todo being executed; set only for [`Phase::ExecuteTodo`].
    pub current: Option<&'a Todo>,
}

/// Everything a provider run needs from the model configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseModel {
    pub provider_id: String,
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub credential: Option<String>,
    pub base_url: Option<String>,
}

pub trait ModelConfiguration: Send + Sync {
    fn phase_model(&self, context: &PhaseContext<'_>) -> PhaseModel;
}

/// Where one phase's requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseEndpoint {
    pub provider_id: String,
    pub model: String,
    pub credential: Option<String>,
    pub base_url: Option<String>,
}

impl PhaseEndpoint {
    #[must_use]
    pub fn new(provider_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model: model.into(),
            credential: None,
            base_url: None,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Built-in templates routed to one endpoint, with optional per-phase overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptedModels {
    default: PhaseEndpoint,
    overrides: BTreeMap<Phase, PhaseEndpoint>,
}

impl PromptedModels {
    #[must_use]
    pub fn uniform(endpoint: PhaseEndpoint) -> Self {
        Self {
            default: endpoint,
            overrides: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_phase(mut self, phase: Phase, endpoint: PhaseEndpoint) -> Self {
        self.overrides.insert(phase, endpoint);
        self
    }

    #[must_use]
    pub fn endpoint(&self, phase: Phase) -> &PhaseEndpoint {
        self.overrides.get(&phase).unwrap_or(&self.default)
    }
}

impl ModelConfiguration for PromptedModels {
    fn phase_model(&self, context: &PhaseContext<'_>) -> PhaseModel {
        let endpoint = self.endpoint(context.phase);
        PhaseModel {
            provider_id: endpoint.provider_id.clone(),
            model: endpoint.model.clone(),
            system: system_prompt(context.phase),
            prompt: user_prompt(context),
            credential: endpoint.credential.clone(),
            base_url: endpoint.base_url.clone(),
        }
    }
}

#[must_use]
pub fn system_prompt(phase: Phase) -> String {
    match phase {
        Phase::Triage => "You rate how much effort a software engineering request needs. \
             Reply with exactly one word: low, medium, or high. \
             Low means a trivial, local change such as a typo or a one-line fix. \
             High means a large change across many files or a new subsystem."
            .to_string(),
        Phase::AnalyzeProject => format!(
            "You are inspecting a repository before any work starts. \
             Use the {READ_ONLY_SHELL_TOOL} tool to look around. Do not modify anything. \
             Answer with a short inventory of the files, languages, and tools relevant to the request."
        ),
        Phase::PlanTodos => format!(
            "You are planning work for a coding agent. \
             Break the request into a short ordered list of independent todos and submit it \
             by calling the {WRITE_PLAN_TOOL} tool exactly once. \
             Give each todo a reasoning_effort of low, medium, or high."
        ),
        Phase::ExecuteTodo => format!(
            "You are a coding agent working on one todo of a larger plan. \
             Use {SHELL_TOOL} to run commands, {FILE_EDITOR_TOOL} to view and edit files, \
             and {WEB_SEARCH_TOOL} or {WEB_FETCH_TOOL} when you need outside information. \
             Finish with a brief description of what you changed."
        ),
        Phase::Summarize => "You report on finished work. \
             Summarize what was done across all todos for the person who made the request. \
             Be concise and mention anything left undone."
            .to_string(),
    }
}

#[must_use]
pub fn user_prompt(context: &PhaseContext<'_>) -> String {
    let mut sections = Vec::new();
    match context.phase {
        Phase::Triage => return context.request.to_string(),
        Phase::AnalyzeProject => {
            sections.push(format!("Request:\n{}", context.request));
            sections.push(format!(
                "Working directory: {}",
                context.working_directory.display()
            ));
            push_optional(&mut sections, "Repository context", context.repository_context);
        }
        Phase::PlanTodos => {
            sections.push(format!("Request:\n{}", context.request));
            push_optional(&mut sections, "Repository context", context.repository_context);
            push_optional(&mut sections, "Project analysis", context.analysis);
            sections.push(format!("Current plan:\n{}", render_context(context.todos)));
        }
        Phase::ExecuteTodo => {
            sections.push(format!("Overall request:\n{}", context.request));
            push_optional(&mut sections, "Repository context", context.repository_context);
            if let Some(todo) = context.current {
                sections.push(format!("Plan:\n{}", render_context(context.todos)));
                sections.push(format!("Current todo:\n{}", todo.description));
                let touched = touched_paths(context.todos);
                if !touched.is_empty() {
                    sections.push(format!("Paths touched so far:\n{}", touched.join("\n")));
                }
            }
        }
        Phase::Summarize => {
            sections.push(format!("Request:\n{}", context.request));
            let finished = context
                .todos
                .iter()
                .filter(|todo| todo.status == TodoStatus::Completed)
                .map(|todo| {
                    format!(
                        "- {}: {}",
                        todo.description,
                        todo.summary.as_deref().unwrap_or("(no summary)")
                    )
                })
                .collect::<Vec<_>>();
            sections.push(format!("Completed todos:\n{}", finished.join("\n")));
        }
    }
    sections.join("\n\n")
}

fn push_optional(sections: &mut Vec<String>, title: &str, text: Option<&str>) {
    if let Some(text) = text.map(str::trim).filter(|text| !text.is_empty()) {
        sections.push(format!("{title}:\n{text}"));
    }
}

fn touched_paths(todos: &[Todo]) -> Vec<String> {
    let mut paths = todos
        .iter()
        .flat_map(|todo| todo.paths.iter().cloned())
        .collect::<Vec<_>>();
    paths.sort();
    paths.dedup();
    paths
}
