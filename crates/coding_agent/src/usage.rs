use std::sync::{Arc, Mutex, MutexGuard};

use agent_provider::{BudgetExceeded, RoundUsage, UsageRecorder};
use serde::Serialize;

/// Cumulative counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub steps: usize,
}

/// Session accounting with a hard step ceiling.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    totals: UsageTotals,
    max_steps: Option<usize>,
}

impl UsageLedger {
    #[must_use]
    pub fn new(max_steps: Option<usize>) -> Self {
        Self {
            totals: UsageTotals::default(),
            max_steps,
        }
    }

    #[must_use]
    pub fn totals(&self) -> UsageTotals {
        self.totals
    }

    #[must_use]
    pub fn max_steps(&self) -> Option<usize> {
        self.max_steps
    }
}

impl UsageRecorder for UsageLedger {
    fn record(&mut self, usage: RoundUsage) -> Result<(), BudgetExceeded> {
        self.totals.input_tokens += usage.input_tokens;
        self.totals.output_tokens += usage.output_tokens;
        self.totals.cost += usage.cost;
        self.totals.steps += 1;

        match self.max_steps {
            Some(max_steps) if self.totals.steps > max_steps => Err(BudgetExceeded {
                steps: self.totals.steps,
                max_steps,
            }),
            _ => Ok(()),
        }
    }
}

/// Handle lending the session ledger to one provider run at a time.
#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<UsageLedger>>,
}

impl SharedLedger {
    #[must_use]
    pub fn new(ledger: UsageLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    #[must_use]
    pub fn totals(&self) -> UsageTotals {
        lock_unpoisoned(&self.inner).totals()
    }
}

impl UsageRecorder for SharedLedger {
    fn record(&mut self, usage: RoundUsage) -> Result<(), BudgetExceeded> {
        lock_unpoisoned(&self.inner).record(usage)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
