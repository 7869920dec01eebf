use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Price in currency units per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriceTable {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Default prices for known model families, most specific prefix first.
const KNOWN_PRICES: &[(&str, PriceTable)] = &[
    ("claude-opus-4", PriceTable::new(15.0, 75.0)),
    ("claude-sonnet-4", PriceTable::new(3.0, 15.0)),
    ("claude-3-7-sonnet", PriceTable::new(3.0, 15.0)),
    ("claude-haiku-4", PriceTable::new(1.0, 5.0)),
    ("claude-3-5-haiku", PriceTable::new(0.8, 4.0)),
    ("gpt-5-nano", PriceTable::new(0.05, 0.40)),
    ("gpt-5-mini", PriceTable::new(0.25, 2.0)),
    ("gpt-5", PriceTable::new(1.25, 10.0)),
    ("gpt-4.1-mini", PriceTable::new(0.40, 1.60)),
    ("gpt-4.1", PriceTable::new(2.0, 8.0)),
    ("o4-mini", PriceTable::new(1.10, 4.40)),
    ("gpt-oss-120b", PriceTable::new(0.15, 0.60)),
    ("gpt-oss-20b", PriceTable::new(0.05, 0.20)),
];

impl PriceTable {
    #[must_use]
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Cost of one round at this price.
    #[must_use]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }

    /// Looks up the default price for a model id, ignoring any `vendor/` prefix.
    #[must_use]
    pub fn for_model(model: &str) -> Option<Self> {
        let id = model.rsplit('/').next().unwrap_or(model);
        KNOWN_PRICES
            .iter()
            .find(|(prefix, _)| id.starts_with(prefix))
            .map(|(_, price)| *price)
    }
}

/// Token usage and cost of one vendor round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

impl RoundUsage {
    #[must_use]
    pub fn priced(input_tokens: u64, output_tokens: u64, price: &PriceTable) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cost: price.cost(input_tokens, output_tokens),
        }
    }
}

/// The configured step ceiling was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("step budget exceeded: {steps} steps taken, limit is {max_steps}")]
pub struct BudgetExceeded {
    pub steps: usize,
    pub max_steps: usize,
}

/// Accounting operation adapters call once per round.
pub trait UsageRecorder: Send {
    /// Adds one round to the counters and re-checks the step ceiling.
    fn record(&mut self, usage: RoundUsage) -> Result<(), BudgetExceeded>;
}
