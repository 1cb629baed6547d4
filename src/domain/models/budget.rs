//! Budget model — per-agent cost ledger and the model price table it is priced against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-1k-token pricing for one model tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// The Budget Tracker's model -> price table, seeded with a small realistic
/// default set and otherwise configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCostTable {
    prices: HashMap<String, ModelPrice>,
    default_price: ModelPrice,
}

impl Default for ModelCostTable {
    fn default() -> Self {
        let mut prices = HashMap::new();
        prices.insert(
            "gpt-4o-mini".to_string(),
            ModelPrice { input_per_1k: 0.00015, output_per_1k: 0.0006 },
        );
        prices.insert(
            "gpt-4o".to_string(),
            ModelPrice { input_per_1k: 0.0025, output_per_1k: 0.01 },
        );
        Self {
            prices,
            default_price: ModelPrice { input_per_1k: 0.001, output_per_1k: 0.002 },
        }
    }
}

impl ModelCostTable {
    pub fn with_price(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    pub fn price_for(&self, model: &str) -> ModelPrice {
        self.prices.get(model).copied().unwrap_or(self.default_price)
    }

    pub fn estimate_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let price = self.price_for(model);
        (input_tokens as f64 / 1000.0) * price.input_per_1k + (output_tokens as f64 / 1000.0) * price.output_per_1k
    }
}

/// One append-only entry in an agent's cost ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub task_id: Uuid,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only per-agent spend ledger. Never mutates or removes past entries;
/// `total_spent` is always a sum over the full history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetLedger {
    entries: Vec<CostEntry>,
}

impl BudgetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task_id: Uuid, model: impl Into<String>, input_tokens: u64, output_tokens: u64, cost: f64) {
        self.entries.push(CostEntry {
            task_id,
            model: model.into(),
            input_tokens,
            output_tokens,
            cost,
            recorded_at: Utc::now(),
        });
    }

    pub fn total_spent(&self) -> f64 {
        self.entries.iter().map(|e| e.cost).sum()
    }

    pub fn entries(&self) -> &[CostEntry] {
        &self.entries
    }

    pub fn exceeds(&self, max_amount: f64) -> bool {
        max_amount > 0.0 && self.total_spent() > max_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_falls_back_to_default_price() {
        let table = ModelCostTable::default();
        assert!(table.estimate_cost("some-future-model", 1000, 1000) > 0.0);
    }

    #[test]
    fn ledger_is_append_only_and_sums_correctly() {
        let mut ledger = BudgetLedger::new();
        ledger.record(Uuid::new_v4(), "gpt-4o-mini", 100, 50, 0.05);
        ledger.record(Uuid::new_v4(), "gpt-4o-mini", 200, 100, 0.10);
        assert_eq!(ledger.entries().len(), 2);
        assert!((ledger.total_spent() - 0.15).abs() < 1e-9);
    }

    #[test]
    fn budget_exceeded_detection() {
        let mut ledger = BudgetLedger::new();
        ledger.record(Uuid::new_v4(), "gpt-4o", 1000, 1000, 50.0);
        assert!(ledger.exceeds(40.0));
        assert!(!ledger.exceeds(100.0));
        assert!(!ledger.exceeds(0.0));
    }
}
