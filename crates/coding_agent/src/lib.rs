//! Headless coding agent.
//!
//! A [`Session`] turns one natural-language request into a stream of
//! [`SessionEvent`]s: the request is triaged for effort, the repository is
//! inspected with a read-only shell, a todo plan is written, each todo is
//! executed with file and shell tools, and multi-todo sessions end with a
//! summary. The stream always finishes with either a `completed` event or a
//! [`SessionError`].
//!
//! ## Provider bootstrap
//!
//! The binary reads a strict JSON config from the path in
//! `CODING_AGENT_CONFIG_PATH` (see [`config`] for the shape). Each phase can
//! route to its own provider: `anthropic`, `openai`, `harmony`, or `mock`.
//! Library callers pass any [`ModelConfiguration`] and, optionally, a
//! [`ProviderRegistry`] with pre-built providers.
//!
//! Logs go through `tracing`; the binary installs an env-filtered subscriber
//! on stderr so stdout carries only events.

pub mod config;
pub mod error;
pub mod events;
pub mod prompts;
pub mod providers;
pub mod session;
pub mod todo;
pub mod tools;
pub mod triage;
pub mod usage;

pub use config::{AgentConfig, ConfigError, CONFIG_PATH_ENV_VAR};
pub use error::SessionError;
pub use events::{CompletionReport, SessionEvent};
pub use prompts::{
    ModelConfiguration, Phase, PhaseContext, PhaseEndpoint, PhaseModel, PromptedModels,
};
pub use providers::{ProviderRegistry, AVAILABLE_PROVIDERS};
pub use session::{create, Environment, Session};
pub use todo::{render_context, Todo, TodoStatus};
pub use usage::{SharedLedger, UsageLedger, UsageTotals};
