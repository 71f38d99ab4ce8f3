//! Cost computation (§4.4 step 5): a provider/model price table consumed
//! over `{prompt, completion, cachedInput, thinking}` tokens, producing the
//! cost (in integer cents) recorded on the [`aegis_core::UsageRecord`].

use crate::provider::TokenUsage;
use std::collections::HashMap;

/// Price per 1,000,000 tokens, in hundredths of a cent, so integer math
/// avoids float drift across millions of calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceTable {
    pub prompt_per_million: u64,
    pub completion_per_million: u64,
    pub cached_input_per_million: u64,
    pub thinking_per_million: u64,
}

/// Price tables keyed by `(provider, model)`. Unknown pairs cost nothing —
/// the gateway still records the usage event, just with a zero cost, so an
/// operator notices a missing price entry rather than a silent failure.
#[derive(Debug, Clone, Default)]
pub struct CostTable {
    prices: HashMap<(String, String), PriceTable>,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, provider: &str, model: &str, price: PriceTable) {
        self.prices.insert((provider.to_string(), model.to_string()), price);
    }

    pub fn seed_defaults() -> Self {
        let mut table = Self::new();
        table.insert(
            "openai",
            "gpt-4o",
            PriceTable {
                prompt_per_million: 250_000,
                completion_per_million: 1_000_000,
                cached_input_per_million: 125_000,
                thinking_per_million: 1_000_000,
            },
        );
        table.insert(
            "anthropic",
            "claude-sonnet-4",
            PriceTable {
                prompt_per_million: 300_000,
                completion_per_million: 1_500_000,
                cached_input_per_million: 30_000,
                thinking_per_million: 1_500_000,
            },
        );
        table
    }

    /// Cost in integer cents for this usage under `provider`/`model`'s price
    /// entry, rounding down. Returns 0 when no entry exists.
    pub fn compute_cost_cents(&self, provider: &str, model: &str, usage: &TokenUsage) -> u64 {
        let Some(price) = self.prices.get(&(provider.to_string(), model.to_string())) else {
            return 0;
        };
        let hundredths_of_cent = usage.prompt * price.prompt_per_million
            + usage.completion * price.completion_per_million
            + usage.cached_input * price.cached_input_per_million
            + usage.thinking * price.thinking_per_million;
        hundredths_of_cent / 1_000_000 / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_model_costs_zero() {
        let table = CostTable::seed_defaults();
        let usage = TokenUsage {
            prompt: 1000,
            completion: 500,
            ..Default::default()
        };
        assert_eq!(table.compute_cost_cents("unknown", "model", &usage), 0);
    }

    #[test]
    fn known_model_computes_nonzero_cost() {
        let table = CostTable::seed_defaults();
        let usage = TokenUsage {
            prompt: 1_000_000,
            completion: 1_000_000,
            cached_input: 0,
            thinking: 0,
        };
        let cost = table.compute_cost_cents("openai", "gpt-4o", &usage);
        assert_eq!(cost, 250 + 1000);
    }
}
