use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use agent_provider::{ModelProvider, PriceTable, ProviderInitError};
use agent_provider_harmony::{HarmonyProvider, HarmonyProviderConfig, HARMONY_PROVIDER_ID};
use agent_provider_messages::{MessagesProvider, MessagesProviderConfig, MESSAGES_PROVIDER_ID};
use agent_provider_mock::{MockProvider, MOCK_PROVIDER_ID};
use agent_provider_responses::{ResponsesProvider, ResponsesProviderConfig, RESPONSES_PROVIDER_ID};

use crate::prompts::PhaseModel;

pub const AVAILABLE_PROVIDERS: [&str; 4] = [
    MESSAGES_PROVIDER_ID,
    RESPONSES_PROVIDER_ID,
    HARMONY_PROVIDER_ID,
    MOCK_PROVIDER_ID,
];

/// Hosted providers refuse to start without an API key.
#[must_use]
pub fn requires_credential(provider_id: &str) -> bool {
    provider_id == MESSAGES_PROVIDER_ID || provider_id == RESPONSES_PROVIDER_ID
}

/// Builds the adapter a phase asked for.
///
/// Instances registered through [`ProviderRegistry::with_provider`] take
/// precedence over constructed ones, so one scripted provider can serve a
/// whole session.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    timeout: Option<Duration>,
    max_tokens: Option<u32>,
    price: Option<PriceTable>,
    registered: BTreeMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Overrides the built-in per-model price tables.
    #[must_use]
    pub fn with_price(mut self, price: PriceTable) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider_id: impl Into<String>, provider: Arc<dyn ModelProvider>) -> Self {
        self.registered.insert(provider_id.into(), provider);
        self
    }

    pub fn provider_for(&self, model: &PhaseModel) -> Result<Arc<dyn ModelProvider>, ProviderInitError> {
        let provider_id = model.provider_id.trim();
        if let Some(provider) = self.registered.get(provider_id) {
            return Ok(Arc::clone(provider));
        }

        let credential = model.credential.clone().unwrap_or_default();
        match provider_id {
            MESSAGES_PROVIDER_ID => {
                let mut config = MessagesProviderConfig::new(credential);
                if let Some(base_url) = &model.base_url {
                    config = config.with_base_url(base_url);
                }
                if let Some(timeout) = self.timeout {
                    config = config.with_timeout(timeout);
                }
                if let Some(max_tokens) = self.max_tokens {
                    config = config.with_max_tokens(max_tokens);
                }
                if let Some(price) = self.price {
                    config = config.with_price(price);
                }
                Ok(Arc::new(MessagesProvider::new(config)?))
            }
            RESPONSES_PROVIDER_ID => {
                let mut config = ResponsesProviderConfig::new(credential);
                if let Some(base_url) = &model.base_url {
                    config = config.with_base_url(base_url);
                }
                if let Some(timeout) = self.timeout {
                    config = config.with_timeout(timeout);
                }
                if let Some(max_tokens) = self.max_tokens {
                    config = config.with_max_output_tokens(max_tokens);
                }
                if let Some(price) = self.price {
                    config = config.with_price(price);
                }
                Ok(Arc::new(ResponsesProvider::new(config)?))
            }
            HARMONY_PROVIDER_ID => {
                let mut config = HarmonyProviderConfig::default();
                if let Some(credential) = model.credential.as_deref().filter(|key| !key.trim().is_empty()) {
                    config = config.with_api_key(credential);
                }
                if let Some(base_url) = &model.base_url {
                    config = config.with_base_url(base_url);
                }
                if let Some(timeout) = self.timeout {
                    config = config.with_timeout(timeout);
                }
                if let Some(max_tokens) = self.max_tokens {
                    config = config.with_max_tokens(max_tokens);
                }
                if let Some(price) = self.price {
                    config = config.with_price(price);
                }
                Ok(Arc::new(HarmonyProvider::new(config)?))
            }
            MOCK_PROVIDER_ID => {
                let mut provider = MockProvider::default();
                if let Some(price) = self.price {
                    provider = provider.with_price(price);
                }
                Ok(Arc::new(provider))
            }
            unknown => Err(ProviderInitError::new(format!(
                "Unsupported provider '{unknown}'. Available providers: {}",
                AVAILABLE_PROVIDERS.join(", ")
            ))),
        }
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("price", &self.price)
            .field("registered", &self.registered.keys().collect::<Vec<_>>())
            .finish()
    }
}
