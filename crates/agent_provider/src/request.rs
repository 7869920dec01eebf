use crate::effort::{ReasoningEffort, Verbosity};
use crate::tool::ToolSet;

/// One logical request handed to a provider adapter.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub session_id: String,
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub tools: ToolSet,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub verbosity: Option<Verbosity>,
    /// Maximum number of vendor rounds for this run.
    pub max_steps: Option<usize>,
    /// Tool whose successful result ends the run immediately.
    pub early_return_tool: Option<String>,
}

impl RunRequest {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        model: impl Into<String>,
        system: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            model: model.into(),
            system: system.into(),
            prompt: prompt.into(),
            tools: ToolSet::new(),
            reasoning_effort: None,
            verbosity: None,
            max_steps: None,
            early_return_tool: None,
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    #[must_use]
    pub fn with_early_return_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.early_return_tool = Some(tool_name.into());
        self
    }

    /// Returns true once `rounds` completed rounds exhaust `max_steps`.
    #[must_use]
    pub fn round_limit_reached(&self, rounds: usize) -> bool {
        self.max_steps.is_some_and(|max_steps| rounds >= max_steps)
    }
}

/// Result of a provider run that ended normally or through the early-return trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Last non-empty assistant text seen during the run.
    pub text: String,
    pub rounds: usize,
    pub returned_early: bool,
}
