//! Strict JSON configuration for the headless binary.
//!
//! ```json
//! {
//!   "provider": "anthropic",
//!   "model": "claude-sonnet-4-5",
//!   "credential_env": "ANTHROPIC_API_KEY",
//!   "timeout_sec": 120,
//!   "max_steps": 200,
//!   "phases": { "triage": { "model": "claude-haiku-4-5" } },
//!   "web_search": { "endpoint": "https://search.example/api", "api_key_env": "SEARCH_KEY" }
//! }
//! ```
//!
//! - `provider` and `model` are required and must be non-empty.
//! - `timeout_sec` and `max_steps` must be > 0 when provided.
//! - `anthropic` and `openai` need a credential, inline or through an env var.
//! - Unknown JSON fields are rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agent_provider::PriceTable;
use agent_provider_mock::MOCK_PROVIDER_ID;
use serde::Deserialize;
use thiserror::Error;

use crate::prompts::{Phase, PhaseEndpoint, PromptedModels};
use crate::providers::{requires_credential, AVAILABLE_PROVIDERS};
use crate::tools::WebSearchSettings;

pub const CONFIG_PATH_ENV_VAR: &str = "CODING_AGENT_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CODING_AGENT_CONFIG_PATH is not set")]
    MissingPath,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub credential_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_sec: Option<u64>,
    #[serde(default)]
    pub max_steps: Option<usize>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub price: Option<PriceTable>,
    #[serde(default)]
    pub phases: PhaseOverrides,
    #[serde(default)]
    pub web_search: Option<WebSearchConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseOverrides {
    #[serde(default)]
    pub triage: Option<PhaseOverride>,
    #[serde(default)]
    pub analyze_project: Option<PhaseOverride>,
    #[serde(default)]
    pub plan_todos: Option<PhaseOverride>,
    #[serde(default)]
    pub execute_todo: Option<PhaseOverride>,
    #[serde(default)]
    pub summarize: Option<PhaseOverride>,
}

impl PhaseOverrides {
    #[must_use]
    pub fn get(&self, phase: Phase) -> Option<&PhaseOverride> {
        match phase {
            Phase::Triage => self.triage.as_ref(),
            Phase::AnalyzeProject => self.analyze_project.as_ref(),
            Phase::PlanTodos => self.plan_todos.as_ref(),
            Phase::ExecuteTodo => self.execute_todo.as_ref(),
            Phase::Summarize => self.summarize.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseOverride {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub credential_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebSearchConfig {
    pub endpoint: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl AgentConfig {
    /// Loads the file named by [`CONFIG_PATH_ENV_VAR`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV_VAR)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingPath)?;
        Self::load(Path::new(&path))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::invalid("provider must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model must not be empty"));
        }
        if self.timeout_sec == Some(0) {
            return Err(ConfigError::invalid("timeout_sec must be > 0"));
        }
        if self.max_steps == Some(0) {
            return Err(ConfigError::invalid("max_steps must be > 0"));
        }
        if self.max_tokens == Some(0) {
            return Err(ConfigError::invalid("max_tokens must be > 0"));
        }
        if let Some(web_search) = &self.web_search {
            if web_search.endpoint.trim().is_empty() {
                return Err(ConfigError::invalid("web_search.endpoint must not be empty"));
            }
        }
        for phase in Phase::ALL {
            self.endpoint(phase)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_sec.map(Duration::from_secs)
    }

    /// Resolves provider, model, and credential for one phase.
    pub fn endpoint(&self, phase: Phase) -> Result<PhaseEndpoint, ConfigError> {
        let phase_override = self.phases.get(phase).cloned().unwrap_or_default();

        let provider = non_empty(phase_override.provider.as_deref())
            .or_else(|| non_empty(Some(self.provider.as_str())))
            .ok_or_else(|| ConfigError::invalid(format!("{phase}: provider must not be empty")))?;
        if !AVAILABLE_PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::invalid(format!(
                "{phase}: unsupported provider '{provider}'. Available providers: {}",
                AVAILABLE_PROVIDERS.join(", ")
            )));
        }

        let model = non_empty(phase_override.model.as_deref())
            .or_else(|| non_empty(Some(self.model.as_str())))
            .ok_or_else(|| ConfigError::invalid(format!("{phase}: model must not be empty")))?;

        let credential = match resolve_credential(
            phase_override.credential.as_deref(),
            phase_override.credential_env.as_deref(),
        )? {
            Some(credential) => Some(credential),
            None => resolve_credential(self.credential.as_deref(), self.credential_env.as_deref())?,
        };
        if credential.is_none() && requires_credential(&provider) {
            return Err(ConfigError::invalid(format!(
                "{phase}: provider '{provider}' requires credential or credential_env"
            )));
        }

        let mut endpoint = PhaseEndpoint::new(provider, model);
        endpoint.credential = credential;
        endpoint.base_url = non_empty(phase_override.base_url.as_deref())
            .or_else(|| non_empty(self.base_url.as_deref()));
        Ok(endpoint)
    }

    /// Built-in prompt templates routed by this config.
    pub fn models(&self) -> Result<PromptedModels, ConfigError> {
        let mut models = PromptedModels::uniform(self.endpoint(Phase::ExecuteTodo)?);
        for phase in Phase::ALL {
            models = models.with_phase(phase, self.endpoint(phase)?);
        }
        Ok(models)
    }

    pub fn web_search_settings(&self) -> Result<Option<WebSearchSettings>, ConfigError> {
        let Some(web_search) = &self.web_search else {
            return Ok(None);
        };
        let api_key = resolve_credential(None, web_search.api_key_env.as_deref())?;
        Ok(Some(WebSearchSettings {
            endpoint: web_search.endpoint.trim().to_string(),
            api_key,
        }))
    }

    #[must_use]
    pub fn is_mock(&self) -> bool {
        self.provider == MOCK_PROVIDER_ID
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

fn resolve_credential(
    inline: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<String>, ConfigError> {
    if let Some(inline) = non_empty(inline) {
        return Ok(Some(inline));
    }
    let Some(env_var) = non_empty(env_var) else {
        return Ok(None);
    };
    match std::env::var(&env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value.trim().to_string())),
        _ => Err(ConfigError::invalid(format!(
            "environment variable {env_var} is not set"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(text: &str) -> Result<AgentConfig, ConfigError> {
        AgentConfig::parse(text, Path::new("agent.json"))
    }

    #[test]
    fn minimal_mock_config_needs_no_credential() {
        let config = parse(r#"{"provider":"mock","model":"scripted"}"#).expect("valid config");

        assert!(config.is_mock());
        assert_eq!(
            config.endpoint(Phase::Summarize).expect("endpoint"),
            PhaseEndpoint::new("mock", "scripted")
        );
    }

    #[test]
    fn phase_overrides_replace_provider_and_model() {
        let config = parse(
            r#"{
                "provider": "openai",
                "model": "gpt-5",
                "credential": "sk-test",
                "phases": { "triage": { "provider": "harmony", "model": "gpt-oss-20b", "base_url": "http://127.0.0.1:9000/v1" } }
            }"#,
        )
        .expect("valid config");

        let triage = config.endpoint(Phase::Triage).expect("triage");
        assert_eq!(triage.provider_id, "harmony");
        assert_eq!(triage.model, "gpt-oss-20b");
        assert_eq!(triage.credential.as_deref(), Some("sk-test"));
        assert_eq!(triage.base_url.as_deref(), Some("http://127.0.0.1:9000/v1"));

        let execute = config.endpoint(Phase::ExecuteTodo).expect("execute");
        assert_eq!(execute.provider_id, "openai");
        assert_eq!(execute.base_url, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = parse(r#"{"provider":"mock","model":"m","temperature":0.2}"#)
            .expect_err("unknown field");
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains("temperature"));
    }

    #[test]
    fn zero_limits_are_rejected() {
        let error = parse(r#"{"provider":"mock","model":"m","timeout_sec":0}"#)
            .expect_err("zero timeout");
        assert_eq!(error.to_string(), "invalid config: timeout_sec must be > 0");

        let error =
            parse(r#"{"provider":"mock","model":"m","max_steps":0}"#).expect_err("zero steps");
        assert_eq!(error.to_string(), "invalid config: max_steps must be > 0");
    }

    #[test]
    fn hosted_providers_require_a_credential() {
        let error = parse(r#"{"provider":"anthropic","model":"claude-sonnet-4-5"}"#)
            .expect_err("missing credential");
        assert_eq!(
            error.to_string(),
            "invalid config: triage: provider 'anthropic' requires credential or credential_env"
        );
    }

    #[test]
    fn unknown_provider_lists_available_ones() {
        let error = parse(r#"{"provider":"custom","model":"m"}"#).expect_err("unknown provider");
        assert!(error
            .to_string()
            .contains("unsupported provider 'custom'. Available providers: anthropic, openai, harmony, mock"));
    }

    #[test]
    fn credential_env_resolves_from_environment() {
        std::env::set_var("CODING_AGENT_TEST_CONFIG_KEY", "sk-from-env");
        let config = parse(
            r#"{"provider":"openai","model":"gpt-5","credential_env":"CODING_AGENT_TEST_CONFIG_KEY"}"#,
        )
        .expect("valid config");

        assert_eq!(
            config
                .endpoint(Phase::PlanTodos)
                .expect("endpoint")
                .credential
                .as_deref(),
            Some("sk-from-env")
        );

        let error = parse(
            r#"{"provider":"openai","model":"gpt-5","credential_env":"CODING_AGENT_TEST_UNSET_KEY"}"#,
        )
        .expect_err("unset env var");
        assert_eq!(
            error.to_string(),
            "invalid config: environment variable CODING_AGENT_TEST_UNSET_KEY is not set"
        );
    }

    #[test]
    fn prices_and_web_search_are_parsed() {
        let config = parse(
            r#"{
                "provider": "mock",
                "model": "m",
                "price": { "input_per_million": 1.5, "output_per_million": 6.0 },
                "web_search": { "endpoint": " https://search.example/api " }
            }"#,
        )
        .expect("valid config");

        assert_eq!(config.price, Some(PriceTable::new(1.5, 6.0)));
        let settings = config
            .web_search_settings()
            .expect("settings")
            .expect("configured");
        assert_eq!(settings.endpoint, "https://search.example/api");
        assert_eq!(settings.api_key, None);
    }
}
