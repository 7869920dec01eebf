//! Session orchestration: triage, project analysis, planning, todo execution,
//! and summary, driven as one lazy event stream.
//!
//! The orchestrator owns the todo list and the usage ledger. Providers only
//! see [`RunRequest`]s and report through the ledger and their event sink;
//! tools see the workspace and a per-todo [`PathTracker`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use agent_provider::{
    ModelProvider, ProviderError, ReasoningEffort, RunEvent, RunOutcome, RunRequest, ToolSet,
    Verbosity,
};
use async_stream::{stream, try_stream};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::error::SessionError;
use crate::events::{CompletionReport, SessionEvent};
use crate::prompts::{ModelConfiguration, Phase, PhaseContext, PhaseModel};
use crate::providers::ProviderRegistry;
use crate::todo::{in_progress_count, next_runnable, refresh_contexts, Todo, TodoStatus};
use crate::tools::{
    parse_plan, PathTracker, PlannedTodo, ShellOptions, ToolContext, WebSearchSettings, Workspace,
    READ_ONLY_SHELL_TOOL, WRITE_PLAN_TOOL,
};
use crate::triage::{apply_guardrail, classify};
use crate::usage::{SharedLedger, UsageLedger};

/// Where and under which limits a session runs.
#[derive(Debug, Clone)]
pub struct Environment {
    pub working_directory: PathBuf,
    /// Ceiling on provider rounds across the whole session.
    pub max_steps: Option<usize>,
    pub shell: ShellOptions,
    pub web_search: Option<WebSearchSettings>,
}

impl Environment {
    #[must_use]
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            max_steps: None,
            shell: ShellOptions::default(),
            web_search: None,
        }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    #[must_use]
    pub fn with_shell_options(mut self, shell: ShellOptions) -> Self {
        self.shell = shell;
        self
    }

    #[must_use]
    pub fn with_web_search(mut self, settings: Option<WebSearchSettings>) -> Self {
        self.web_search = settings;
        self
    }
}

/// One user request and everything needed to carry it out.
pub struct Session {
    id: String,
    prompt: String,
    created_at: OffsetDateTime,
    environment: Environment,
    models: Arc<dyn ModelConfiguration>,
    providers: ProviderRegistry,
    initial_todos: Option<Vec<Todo>>,
    repository_context: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        environment: Environment,
        models: Arc<dyn ModelConfiguration>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            created_at: OffsetDateTime::now_utc(),
            environment,
            models,
            providers: ProviderRegistry::default(),
            initial_todos: None,
            repository_context: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Skips triage and planning; an in-progress todo is resumed first.
    #[must_use]
    pub fn with_initial_todos(mut self, todos: Vec<Todo>) -> Self {
        self.initial_todos = Some(todos);
        self
    }

    #[must_use]
    pub fn with_repository_context(mut self, context: impl Into<String>) -> Self {
        self.repository_context = Some(context.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Runs the session. Nothing happens until the stream is polled.
    ///
    /// Every item is `Ok` except a fatal condition, which is the last item.
    /// Fatal conditions other than the step budget are preceded by one
    /// `error` event.
    pub fn run(self) -> impl Stream<Item = Result<SessionEvent, SessionError>> + Send + 'static {
        try_stream! {
            let started = Instant::now();
            let span = info_span!("session", id = %self.id);
            let session_id = self.id.clone();

            let setup = Orchestrator::new(self, span, started);
            if let Err(error) = &setup {
                yield error_event(&session_id, error);
            }
            let mut orchestrator = setup?;

            loop {
                let next = orchestrator.next_call();
                if let Err(error) = &next {
                    if error.needs_error_event() {
                        yield orchestrator.error_event(error);
                    }
                }
                let Some(call) = next? else {
                    break;
                };

                let PhaseCall {
                    phase,
                    provider,
                    request,
                    preamble,
                } = call;
                for event in preamble {
                    yield event;
                }

                let mut items = Box::pin(run_phase(
                    provider,
                    request,
                    orchestrator.ledger.clone(),
                    orchestrator.span.clone(),
                ));
                let mut outcome = None;
                while let Some(item) = items.next().await {
                    match item {
                        PhaseItem::Event(event) => {
                            for forwarded in orchestrator.observe(phase, event) {
                                yield forwarded;
                            }
                        }
                        PhaseItem::Finished(result) => outcome = Some(result),
                    }
                }

                let span = orchestrator.span.clone();
                let finished = orchestrator.finish_call(phase, outcome).instrument(span).await;
                if let Err(error) = &finished {
                    if error.needs_error_event() {
                        yield orchestrator.error_event(error);
                    }
                }
                for event in finished? {
                    yield event;
                }
            }

            yield orchestrator.completion();
        }
    }
}

/// Starts a session with the built-in provider registry.
pub fn create(
    prompt: impl Into<String>,
    environment: Environment,
    models: Arc<dyn ModelConfiguration>,
    initial_todos: Option<Vec<Todo>>,
    repository_context: Option<String>,
) -> impl Stream<Item = Result<SessionEvent, SessionError>> + Send + 'static {
    let mut session = Session::new(prompt, environment, models);
    if let Some(todos) = initial_todos {
        session = session.with_initial_todos(todos);
    }
    if let Some(context) = repository_context {
        session = session.with_repository_context(context);
    }
    session.run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Triage,
    AnalyzeProject,
    Plan,
    Execute,
    Summarize,
    Done,
}

struct PhaseCall {
    phase: Phase,
    provider: Arc<dyn ModelProvider>,
    request: RunRequest,
    /// Events emitted before the provider starts.
    preamble: Vec<SessionEvent>,
}

/// Todo currently handed to a provider, with the tools lent to it.
struct ActiveTodo {
    index: usize,
    tools: ToolSet,
    tracker: PathTracker,
}

struct Orchestrator {
    session_id: String,
    prompt: String,
    started: Instant,
    span: Span,
    tools: ToolContext,
    models: Arc<dyn ModelConfiguration>,
    providers: ProviderRegistry,
    repository_context: Option<String>,
    ledger: SharedLedger,
    todos: Vec<Todo>,
    stage: Stage,
    resumed: bool,
    effort: ReasoningEffort,
    analysis: Option<String>,
    last_plan_message: Option<String>,
    proposed_plan: Option<(String, Vec<PlannedTodo>)>,
    active: Option<ActiveTodo>,
    narrative: Option<String>,
}

impl Orchestrator {
    fn new(session: Session, span: Span, started: Instant) -> Result<Self, SessionError> {
        let Session {
            id,
            prompt,
            created_at,
            environment,
            models,
            providers,
            initial_todos,
            repository_context,
        } = session;

        let workspace = Workspace::new(&environment.working_directory).map_err(|message| {
            SessionError::WorkingDirectory {
                path: environment.working_directory.clone(),
                message,
            }
        })?;

        let resumed = initial_todos.is_some();
        let mut todos = initial_todos.unwrap_or_default();
        let running = in_progress_count(&todos);
        if running > 1 {
            return Err(SessionError::ConflictingInProgress(running));
        }
        refresh_contexts(&mut todos);

        span.in_scope(|| {
            info!(
                created_at = %created_at.format(&Rfc3339).unwrap_or_else(|_| created_at.to_string()),
                working_directory = %workspace.root().display(),
                max_steps = ?environment.max_steps,
                initial_todos = todos.len(),
                "session started"
            );
        });

        let mut tools = ToolContext::new(workspace).with_web_search(environment.web_search);
        tools.shell = environment.shell;

        Ok(Self {
            session_id: id,
            prompt,
            started,
            span,
            tools,
            models,
            providers,
            repository_context,
            ledger: SharedLedger::new(UsageLedger::new(environment.max_steps)),
            todos,
            stage: if resumed {
                Stage::AnalyzeProject
            } else {
                Stage::Triage
            },
            resumed,
            effort: ReasoningEffort::default(),
            analysis: None,
            last_plan_message: None,
            proposed_plan: None,
            active: None,
            narrative: None,
        })
    }

    /// Decides the next provider run, or `None` once the session is done.
    fn next_call(&mut self) -> Result<Option<PhaseCall>, SessionError> {
        let span = self.span.clone();
        let _entered = span.enter();
        loop {
            let phase = match self.stage {
                Stage::Triage => Phase::Triage,
                Stage::AnalyzeProject => Phase::AnalyzeProject,
                Stage::Plan => Phase::PlanTodos,
                Stage::Summarize => Phase::Summarize,
                Stage::Done => return Ok(None),
                Stage::Execute => match next_runnable(&self.todos) {
                    Some(index) => return self.execute_call(index).map(Some),
                    None => {
                        self.stage = if self.todos.len() > 1 {
                            Stage::Summarize
                        } else {
                            Stage::Done
                        };
                        continue;
                    }
                },
            };

            let (tools, effort) = match phase {
                Phase::Triage => (ToolSet::new(), ReasoningEffort::Low),
                Phase::AnalyzeProject => (self.tools.analysis_tools(), ReasoningEffort::Low),
                Phase::PlanTodos => (self.tools.plan_tools(), self.effort),
                _ => (self.tools.plan_tools(), ReasoningEffort::Low),
            };
            let model = self.phase_model(phase, None);
            let provider = self.provider_for(phase, &model)?;

            let mut request = self.request(model, tools, effort);
            match phase {
                Phase::Triage => request = request.with_max_steps(1),
                Phase::PlanTodos => request = request.with_early_return_tool(WRITE_PLAN_TOOL),
                _ => {}
            }

            return Ok(Some(PhaseCall {
                phase,
                provider,
                request,
                preamble: Vec::new(),
            }));
        }
    }

    fn execute_call(&mut self, index: usize) -> Result<PhaseCall, SessionError> {
        let todo = &mut self.todos[index];
        if todo.status == TodoStatus::Pending {
            todo.start()?;
        } else {
            info!(todo = %todo.description, "resuming interrupted todo");
        }
        let effort = todo.reasoning_effort;
        let tracker = PathTracker::seeded(todo.paths.iter().cloned());

        let mut preamble = Vec::new();
        if self.todos.len() > 1 {
            preamble.push(self.snapshot());
        }

        let model = self.phase_model(Phase::ExecuteTodo, Some(index));
        let provider = self.provider_for(Phase::ExecuteTodo, &model)?;
        let tools = self.tools.execution_tools(&tracker);
        let request = self.request(model, tools.clone(), effort);
        self.active = Some(ActiveTodo {
            index,
            tools,
            tracker,
        });

        Ok(PhaseCall {
            phase: Phase::ExecuteTodo,
            provider,
            request,
            preamble,
        })
    }

    /// Filters and interprets one provider event; returns what to forward.
    fn observe(&mut self, phase: Phase, event: RunEvent) -> Vec<SessionEvent> {
        match phase {
            Phase::Triage => match event {
                RunEvent::Error { .. } => vec![event.into()],
                _ => Vec::new(),
            },
            Phase::AnalyzeProject => {
                let forward = match &event {
                    RunEvent::Text { .. } | RunEvent::Reasoning { .. } | RunEvent::Error { .. } => true,
                    _ => event.tool_name() == Some(READ_ONLY_SHELL_TOOL),
                };
                if forward {
                    vec![event.into()]
                } else {
                    Vec::new()
                }
            }
            Phase::PlanTodos => self.observe_plan(event),
            Phase::ExecuteTodo | Phase::Summarize => vec![event.into()],
        }
    }

    fn observe_plan(&mut self, event: RunEvent) -> Vec<SessionEvent> {
        match &event {
            RunEvent::ToolCall {
                call_id,
                tool_name,
                arguments,
                ..
            } if tool_name == WRITE_PLAN_TOOL => {
                self.capture_plan(call_id, arguments);
                vec![event.into()]
            }
            RunEvent::ToolResult { call_id, .. }
                if self
                    .proposed_plan
                    .as_ref()
                    .is_some_and(|(proposed_id, _)| proposed_id == call_id) =>
            {
                let mut forwarded = vec![event.into()];
                if let Some((_, planned)) = self.proposed_plan.take() {
                    self.apply_plan(planned);
                    forwarded.push(self.snapshot());
                }
                forwarded
            }
            _ => vec![event.into()],
        }
    }

    fn capture_plan(&mut self, call_id: &str, arguments: &Value) {
        match parse_plan(arguments) {
            Ok(planned) => self.proposed_plan = Some((call_id.to_string(), planned)),
            Err(error) => {
                debug!(%error, "ignoring invalid plan proposal");
                self.proposed_plan = None;
            }
        }
    }

    /// Keeps completed todos and appends the proposal as pending work.
    fn apply_plan(&mut self, planned: Vec<PlannedTodo>) {
        let effort = self.effort;
        self.todos.retain(|todo| todo.status == TodoStatus::Completed);
        self.todos.extend(planned.into_iter().map(|planned| {
            Todo::new(planned.description, planned.reasoning_effort.unwrap_or(effort))
        }));
        refresh_contexts(&mut self.todos);
        info!(todos = self.todos.len(), "plan applied");
    }

    async fn finish_call(
        &mut self,
        phase: Phase,
        outcome: Option<Result<RunOutcome, ProviderError>>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        if let Some(active) = self.active.take() {
            if let Some(todo) = self.todos.get_mut(active.index) {
                todo.merge_paths(active.tracker.snapshot());
            }
            active.tools.dispose_all().await;
        }

        let outcome = outcome
            .unwrap_or_else(|| Err(ProviderError::decode("provider run ended without an outcome")))
            .map_err(|source| {
                if source.is_budget_exceeded() {
                    warn!(phase = %phase, %source, "step budget exceeded");
                }
                SessionError::Provider { phase, source }
            })?;
        debug!(phase = %phase, rounds = outcome.rounds, returned_early = outcome.returned_early, "phase finished");

        let mut events = Vec::new();
        match phase {
            Phase::Triage => {
                self.effort = apply_guardrail(&self.prompt, classify(&outcome.text));
                info!(effort = %self.effort, "request triaged");
                self.stage = Stage::AnalyzeProject;
            }
            Phase::AnalyzeProject => {
                self.analysis = Some(outcome.text).filter(|text| !text.trim().is_empty());
                self.stage = if self.resumed {
                    Stage::Execute
                } else if self.effort == ReasoningEffort::Low {
                    self.seed_single_todo();
                    Stage::Execute
                } else {
                    Stage::Plan
                };
            }
            Phase::PlanTodos => {
                self.last_plan_message = Some(outcome.text).filter(|text| !text.trim().is_empty());
                if self.todos.is_empty() {
                    warn!("planning produced no todos; falling back to the request itself");
                    self.todos
                        .push(Todo::new(self.prompt.clone(), ReasoningEffort::Medium));
                    refresh_contexts(&mut self.todos);
                }
                self.stage = Stage::Execute;
            }
            Phase::ExecuteTodo => {
                if let Some(index) = self.todos.iter().position(|todo| todo.status == TodoStatus::InProgress) {
                    self.todos[index].complete(outcome.text)?;
                    info!(todo = index + 1, total = self.todos.len(), "todo completed");
                }
                refresh_contexts(&mut self.todos);
                if self.todos.len() > 1 {
                    events.push(self.snapshot());
                }
            }
            Phase::Summarize => {
                self.narrative = Some(outcome.text).filter(|text| !text.trim().is_empty());
                self.stage = Stage::Done;
            }
        }
        Ok(events)
    }

    /// Low path: the request and the analysis become the only todo.
    fn seed_single_todo(&mut self) {
        let description = match &self.analysis {
            Some(analysis) => format!("{}\n\n{analysis}", self.prompt),
            None => self.prompt.clone(),
        };
        self.todos = vec![Todo::new(description, ReasoningEffort::Low)];
        refresh_contexts(&mut self.todos);
    }

    fn phase_model(&self, phase: Phase, current: Option<usize>) -> PhaseModel {
        let context = PhaseContext {
            phase,
            request: &self.prompt,
            working_directory: self.tools.workspace.root(),
            repository_context: self.repository_context.as_deref(),
            analysis: self.analysis.as_deref(),
            todos: &self.todos,
            current: current.and_then(|index| self.todos.get(index)),
        };
        self.models.phase_model(&context)
    }

    fn provider_for(&self, phase: Phase, model: &PhaseModel) -> Result<Arc<dyn ModelProvider>, SessionError> {
        info!(phase = %phase, provider = %model.provider_id, model = %model.model, "phase started");
        self.providers
            .provider_for(model)
            .map_err(|source| SessionError::ProviderInit { phase, source })
    }

    fn request(&self, model: PhaseModel, tools: ToolSet, effort: ReasoningEffort) -> RunRequest {
        RunRequest::new(self.session_id.clone(), model.model, model.system, model.prompt)
            .with_tools(tools)
            .with_reasoning_effort(effort)
            .with_verbosity(Verbosity::from(effort))
    }

    fn snapshot(&self) -> SessionEvent {
        SessionEvent::Todos {
            session_id: self.session_id.clone(),
            todos: self.todos.clone(),
        }
    }

    fn error_event(&self, error: &SessionError) -> SessionEvent {
        error_event(&self.session_id, error)
    }

    fn completion(&self) -> SessionEvent {
        let totals = self.ledger.totals();
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let summary = self.narrative.clone().or_else(|| match self.todos.as_slice() {
            [only] => only.summary.clone(),
            _ => None,
        });
        self.span.in_scope(|| {
            info!(
                steps = totals.steps,
                input_tokens = totals.input_tokens,
                output_tokens = totals.output_tokens,
                cost = totals.cost,
                duration_ms,
                "session completed"
            );
        });

        SessionEvent::Completed(CompletionReport {
            session_id: self.session_id.clone(),
            input_tokens: totals.input_tokens,
            output_tokens: totals.output_tokens,
            steps: totals.steps,
            duration_ms,
            todos: self.todos.clone(),
            cost: (totals.cost > 0.0).then_some(totals.cost),
            summary,
        })
    }
}

fn error_event(session_id: &str, error: &SessionError) -> SessionEvent {
    SessionEvent::Error {
        session_id: session_id.to_string(),
        message: error.to_string(),
    }
}

enum PhaseItem {
    Event(RunEvent),
    Finished(Result<RunOutcome, ProviderError>),
}

/// Streams one provider run's events as they are produced, then its outcome.
fn run_phase(
    provider: Arc<dyn ModelProvider>,
    request: RunRequest,
    ledger: SharedLedger,
    span: Span,
) -> impl Stream<Item = PhaseItem> + Send {
    stream! {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut recorder = ledger;
        let mut emit = move |event: RunEvent| {
            let _ = sender.send(event);
        };
        let mut run = Box::pin(provider.run(request, &mut recorder, &mut emit).instrument(span));

        let finished = loop {
            let next = tokio::select! {
                biased;
                Some(event) = receiver.recv() => PhaseItem::Event(event),
                outcome = &mut run => PhaseItem::Finished(outcome),
            };
            match next {
                PhaseItem::Event(event) => yield PhaseItem::Event(event),
                finished => break finished,
            }
        };
        drop(run);
        while let Ok(event) = receiver.try_recv() {
            yield PhaseItem::Event(event);
        }
        yield finished;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use agent_provider::{BudgetExceeded, Tool, ToolError};
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::prompts::{PhaseEndpoint, PromptedModels};

    struct CountingTool {
        disposals: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counting"
        }

        fn description(&self) -> &str {
            "Counts disposals"
        }

        fn parameters(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
            Ok(String::new())
        }

        async fn dispose(&self) {
            self.disposals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn orchestrator(root: &std::path::Path, todos: Vec<Todo>) -> Orchestrator {
        let models = Arc::new(PromptedModels::uniform(PhaseEndpoint::new("mock", "scripted")));
        let session = Session::new("do it", Environment::new(root), models).with_initial_todos(todos);
        Orchestrator::new(session, Span::none(), Instant::now()).expect("orchestrator")
    }

    #[tokio::test]
    async fn failed_todo_still_merges_paths_and_disposes_tools_once() {
        let workspace = tempdir().expect("temp workspace");
        let mut todo = Todo::new("edit", ReasoningEffort::Low);
        todo.merge_paths(["old.rs"]);
        todo.start().expect("start");
        let mut orchestrator = orchestrator(workspace.path(), vec![todo]);

        let disposals = Arc::new(AtomicUsize::new(0));
        let tracker = PathTracker::seeded(["old.rs".to_string()]);
        tracker.record("new.rs");
        orchestrator.active = Some(ActiveTodo {
            index: 0,
            tools: ToolSet::new().with(CountingTool {
                disposals: Arc::clone(&disposals),
            }),
            tracker,
        });

        let error = orchestrator
            .finish_call(
                Phase::ExecuteTodo,
                Some(Err(ProviderError::from(BudgetExceeded {
                    steps: 2,
                    max_steps: 1,
                }))),
            )
            .await
            .expect_err("budget failure propagates");

        assert!(error.is_budget_exceeded());
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
        assert_eq!(
            orchestrator.todos[0].paths.iter().cloned().collect::<Vec<_>>(),
            vec!["new.rs".to_string(), "old.rs".to_string()]
        );
        assert_eq!(orchestrator.todos[0].status, TodoStatus::InProgress);

        orchestrator
            .finish_call(Phase::Summarize, Some(Ok(RunOutcome {
                text: "wrap".to_string(),
                rounds: 1,
                returned_early: false,
            })))
            .await
            .expect("later phases do not touch the finished todo");
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn plan_replaces_pending_todos_and_keeps_completed_ones() {
        let workspace = tempdir().expect("temp workspace");
        let mut done = Todo::new("inspect", ReasoningEffort::Low);
        done.start().expect("start");
        done.complete("looked around").expect("complete");
        let mut orchestrator = orchestrator(
            workspace.path(),
            vec![done, Todo::new("stale", ReasoningEffort::Low)],
        );
        orchestrator.effort = ReasoningEffort::High;

        let call = RunEvent::ToolCall {
            session_id: "s".to_string(),
            call_id: "plan-1".to_string(),
            tool_name: WRITE_PLAN_TOOL.to_string(),
            arguments: json!({ "todos": [{ "description": "A" }, { "description": "B", "reasoning_effort": "low" }] }),
        };
        let result = RunEvent::ToolResult {
            session_id: "s".to_string(),
            call_id: "plan-1".to_string(),
            tool_name: WRITE_PLAN_TOOL.to_string(),
            output: "Plan recorded with 2 todo(s).".to_string(),
        };

        assert_eq!(orchestrator.observe(Phase::PlanTodos, call).len(), 1);
        let forwarded = orchestrator.observe(Phase::PlanTodos, result);

        assert_eq!(forwarded.len(), 2);
        assert!(matches!(&forwarded[1], SessionEvent::Todos { todos, .. } if todos.len() == 3));
        let descriptions = orchestrator
            .todos
            .iter()
            .map(|todo| (todo.description.as_str(), todo.status, todo.reasoning_effort))
            .collect::<Vec<_>>();
        assert_eq!(
            descriptions,
            vec![
                ("inspect", TodoStatus::Completed, ReasoningEffort::Low),
                ("A", TodoStatus::Pending, ReasoningEffort::High),
                ("B", TodoStatus::Pending, ReasoningEffort::Low),
            ]
        );
        assert!(orchestrator.todos[1..].iter().all(|todo| !todo.context.is_empty()));
    }

    #[test]
    fn analysis_forwards_only_read_only_shell_tool_events() {
        let workspace = tempdir().expect("temp workspace");
        let mut orchestrator = orchestrator(workspace.path(), Vec::new());
        let tool_event = |name: &str| RunEvent::ToolResult {
            session_id: "s".to_string(),
            call_id: "c".to_string(),
            tool_name: name.to_string(),
            output: "ok".to_string(),
        };

        assert_eq!(
            orchestrator
                .observe(Phase::AnalyzeProject, tool_event(READ_ONLY_SHELL_TOOL))
                .len(),
            1
        );
        assert!(orchestrator
            .observe(Phase::AnalyzeProject, tool_event("shell"))
            .is_empty());
        assert!(orchestrator
            .observe(
                Phase::Triage,
                RunEvent::Text {
                    session_id: "s".to_string(),
                    text: "low".to_string(),
                }
            )
            .is_empty());
    }

    #[test]
    fn more_than_one_running_initial_todo_is_rejected() {
        let workspace = tempdir().expect("temp workspace");
        let running = || {
            let mut todo = Todo::new("x", ReasoningEffort::Low);
            todo.start().expect("start");
            todo
        };
        let models = Arc::new(PromptedModels::uniform(PhaseEndpoint::new("mock", "scripted")));
        let session = Session::new("do it", Environment::new(workspace.path()), models)
            .with_initial_todos(vec![running(), running()]);

        let error = match Orchestrator::new(session, Span::none(), Instant::now()) {
            Ok(_) => panic!("two running todos should be rejected"),
            Err(error) => error,
        };
        assert!(matches!(error, SessionError::ConflictingInProgress(2)));
    }
}
