//! Provider registry (§4.4): adapters keyed by provider name, each gated by
//! its own circuit breaker. Simplified from a routing-strategy registry
//! down to plain name lookup — the gateway always knows which provider it
//! wants from the capsule/config, it never needs to pick one.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::provider::LlmProviderAdapter;
use crate::LlmError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds one adapter and its breaker per provider id.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn LlmProviderAdapter>>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    breaker_config: CircuitBreakerConfig,
}

impl ProviderRegistry {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            adapters: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
            breaker_config,
        }
    }

    pub async fn register(&self, adapter: Arc<dyn LlmProviderAdapter>) {
        let id = adapter.provider_id().to_string();
        self.breakers
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.breaker_config)));
        self.adapters.write().await.insert(id, adapter);
    }

    pub async fn unregister(&self, provider_id: &str) {
        self.adapters.write().await.remove(provider_id);
        self.breakers.write().await.remove(provider_id);
    }

    /// Look up an adapter by provider id, returning `Unconfigured` if none
    /// is registered (§7: no provider adapter registered for this org/agent).
    pub async fn adapter(&self, provider_id: &str) -> Result<Arc<dyn LlmProviderAdapter>, LlmError> {
        self.adapters
            .read()
            .await
            .get(provider_id)
            .cloned()
            .ok_or(LlmError::Unconfigured)
    }

    /// The breaker gating this provider, created lazily with the registry's
    /// default config if the provider was never explicitly registered.
    pub async fn breaker(&self, provider_id: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().await.get(provider_id) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.breaker_config)))
            .clone()
    }

    pub async fn has_provider(&self, provider_id: &str) -> bool {
        self.adapters.read().await.contains_key(provider_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::ScriptedAdapter;

    #[tokio::test]
    async fn unregistered_provider_is_unconfigured() {
        let registry = ProviderRegistry::new(CircuitBreakerConfig::default());
        let err = registry.adapter("openai").await.unwrap_err();
        assert!(matches!(err, LlmError::Unconfigured { .. }));
    }

    #[tokio::test]
    async fn registered_provider_round_trips() {
        let registry = ProviderRegistry::new(CircuitBreakerConfig::default());
        let adapter = Arc::new(ScriptedAdapter::new("openai", vec![]));
        registry.register(adapter.clone()).await;
        assert!(registry.has_provider("openai").await);
        let fetched = registry.adapter("openai").await.unwrap();
        assert_eq!(fetched.provider_id(), "openai");
    }
}
