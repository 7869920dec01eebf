use std::path::PathBuf;

use agent_provider::{ProviderError, ProviderInitError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::prompts::Phase;
use crate::todo::TodoTransitionError;

/// Fatal outcome of a session. Always the last item of the event stream.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{phase} provider failed: {source}")]
    Provider {
        phase: Phase,
        #[source]
        source: ProviderError,
    },

    #[error("failed to initialize {phase} provider: {source}")]
    ProviderInit {
        phase: Phase,
        #[source]
        source: ProviderInitError,
    },

    #[error("initial todos contain {0} in-progress todos; at most one is allowed")]
    ConflictingInProgress(usize),

    #[error("working directory {path} is unusable: {message}")]
    WorkingDirectory { path: PathBuf, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Todo(#[from] TodoTransitionError),
}

impl SessionError {
    /// Returns true when the session was stopped by the step ceiling.
    #[must_use]
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Self::Provider { source, .. } if source.is_budget_exceeded())
    }

    /// False for provider failures: the adapter emits their `error` event itself.
    #[must_use]
    pub fn needs_error_event(&self) -> bool {
        !matches!(self, Self::Provider { .. })
    }
}

#[cfg(test)]
mod tests {
    use agent_provider::BudgetExceeded;

    use super::*;

    #[test]
    fn budget_errors_are_reported_with_their_phase() {
        let error = SessionError::Provider {
            phase: Phase::ExecuteTodo,
            source: ProviderError::from(BudgetExceeded {
                steps: 3,
                max_steps: 2,
            }),
        };

        assert!(error.is_budget_exceeded());
        assert_eq!(
            error.to_string(),
            "execute_todo provider failed: step budget exceeded: 3 steps taken, limit is 2"
        );
    }

    #[test]
    fn init_errors_are_not_budget_errors() {
        let error = SessionError::ProviderInit {
            phase: Phase::Triage,
            source: ProviderInitError::new("API key is required"),
        };

        assert!(!error.is_budget_exceeded());
        assert!(error.needs_error_event());
        assert_eq!(
            error.to_string(),
            "failed to initialize triage provider: API key is required"
        );
    }
}
