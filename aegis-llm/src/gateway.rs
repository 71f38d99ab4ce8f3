//! LLM Gateway (C4, §4.4): the single `generate` entry point every runner
//! and the Dispatcher call through. Pseudonymizes in, calls the provider
//! under a circuit breaker and retry policy, reverses out, meters cost, and
//! emits the two lifecycle events — all before the caller ever sees a
//! plaintext provider response or a raw provider error.

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::config::LlmGatewayConfig;
use crate::cost::CostTable;
use crate::provider::{GenerateOptions, ProviderGenerateRequest};
use crate::registry::ProviderRegistry;
use crate::retry::retry_with_backoff;
use crate::LlmError;
use aegis_core::{
    CallerType, EntityIdType, IdentityCapsule, PiiDictionary, UsageRecord, UsageRecordId, UsageRecordStatus,
};
use aegis_pii::PiiTransformer;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Minimal observability event shape the gateway emits; kept generic over
/// the event payload since `aegis-events` owns the bus and its schema —
/// the gateway only needs a place to hand events to.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event_type: &str, capsule: &IdentityCapsule, payload: serde_json::Value);
}

/// Where completed calls get metered. Decoupled from `aegis-storage` the
/// same way: the gateway only needs an append, not the store's full API.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: UsageRecord);
}

/// No-op sinks for callers that don't wire up a bus/store yet (tests, or a
/// runner that only cares about the returned text).
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, _event_type: &str, _capsule: &IdentityCapsule, _payload: serde_json::Value) {}
}

pub struct NullUsageSink;

#[async_trait]
impl UsageSink for NullUsageSink {
    async fn record(&self, _record: UsageRecord) {}
}

/// Everything one `generate` call needs beyond the prompts themselves.
pub struct GenerateRequest<'a> {
    pub capsule: &'a IdentityCapsule,
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub options: GenerateOptions,
    pub dictionary: Option<&'a PiiDictionary>,
    pub caller_type: CallerType,
    pub caller_name: String,
}

pub struct LlmGateway {
    registry: Arc<ProviderRegistry>,
    pii: PiiTransformer,
    costs: CostTable,
    config: LlmGatewayConfig,
    events: Arc<dyn EventSink>,
    usage: Arc<dyn UsageSink>,
}

impl LlmGateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        pii: PiiTransformer,
        costs: CostTable,
        config: LlmGatewayConfig,
        events: Arc<dyn EventSink>,
        usage: Arc<dyn UsageSink>,
    ) -> Self {
        Self {
            registry,
            pii,
            costs,
            config,
            events,
            usage,
        }
    }

    pub fn with_defaults(registry: Arc<ProviderRegistry>) -> Self {
        Self::new(
            registry,
            PiiTransformer::default(),
            CostTable::seed_defaults(),
            LlmGatewayConfig::from_env(),
            Arc::new(NullEventSink),
            Arc::new(NullUsageSink),
        )
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// For external callers that invoke specialized models directly and
    /// just need the accounting side of the pipeline (no provider call, no
    /// pseudonymization).
    pub async fn record_usage(&self, record: UsageRecord) {
        self.usage.record(record).await;
    }

    /// The §4.4 pipeline: emit started -> pseudonymize -> call provider
    /// (breaker-gated, timed-out, retried) -> reverse -> cost -> record +
    /// emit completed -> return.
    pub async fn generate(
        &self,
        request: GenerateRequest<'_>,
        cancellation: &CancellationToken,
    ) -> Result<String, LlmError> {
        self.events
            .emit(
                "agent.llm.started",
                request.capsule,
                serde_json::json!({
                    "provider": request.provider,
                    "model": request.model,
                }),
            )
            .await;

        let system = self.pii.pseudonymize(&request.system_prompt, request.dictionary);
        let user = self.pii.pseudonymize(&request.user_prompt, request.dictionary);
        let mut mappings = system.mappings.clone();
        mappings.extend(user.mappings.clone());

        let breaker = self.registry.breaker(&request.provider).await;
        if !breaker.is_allowed() {
            return Err(LlmError::UpstreamFailure {
                provider: request.provider.clone(),
                status: 0,
                message: "circuit breaker open".to_string(),
            });
        }

        let adapter = self.registry.adapter(&request.provider).await?;
        let started_at = Instant::now();

        let provider_request = ProviderGenerateRequest {
            model: request.model.clone(),
            system_prompt: system.text,
            user_prompt: user.text,
            options: request.options,
        };

        let call_result = if cancellation.is_cancelled() {
            Err(LlmError::Cancelled)
        } else {
            let timeout = self.config.provider_timeout;
            let retry_config = self.config.retry;
            let adapter = adapter.clone();
            let attempt = || {
                let adapter = adapter.clone();
                let req = provider_request.clone();
                async move { adapter.generate(req).await }
            };
            tokio::select! {
                _ = cancellation.cancelled() => Err(LlmError::Cancelled),
                result = tokio::time::timeout(timeout, retry_with_backoff(retry_config, attempt)) => {
                    match result {
                        Ok(inner) => inner,
                        Err(_) => Err(LlmError::Timeout {
                            provider: request.provider.clone(),
                            timeout_ms: timeout.as_millis() as i64,
                        }),
                    }
                }
            }
        };

        match &call_result {
            Ok(_) => breaker.record_success(),
            Err(err) if !matches!(err, LlmError::Cancelled) => breaker.record_failure(),
            Err(_) => {}
        }

        let response = match call_result {
            Ok(response) => response,
            Err(err) => {
                if matches!(err, LlmError::Cancelled) {
                    // §4.4: the provider call never billed, so usage is
                    // zeroed rather than omitted.
                    self.usage
                        .record(UsageRecord {
                            id: UsageRecordId::now_v7(),
                            capsule: request.capsule.clone(),
                            provider: request.provider.clone(),
                            model: request.model.clone(),
                            caller_type: request.caller_type,
                            caller_name: request.caller_name.clone(),
                            prompt_tokens: 0,
                            completion_tokens: 0,
                            cached_input_tokens: None,
                            thinking_tokens: None,
                            cost_cents: 0,
                            latency_ms: started_at.elapsed().as_millis() as i64,
                            status: UsageRecordStatus::Cancelled,
                            timestamp: chrono::Utc::now(),
                        })
                        .await;
                }
                return Err(err);
            }
        };
        let reversed = self.pii.reverse(&response.text, &mappings);
        let cost_cents = self.costs.compute_cost_cents(&request.provider, &request.model, &response.usage);
        let latency_ms = started_at.elapsed().as_millis() as i64;

        let record = UsageRecord {
            id: UsageRecordId::now_v7(),
            capsule: request.capsule.clone(),
            provider: request.provider.clone(),
            model: request.model.clone(),
            caller_type: request.caller_type,
            caller_name: request.caller_name.clone(),
            prompt_tokens: response.usage.prompt as i64,
            completion_tokens: response.usage.completion as i64,
            cached_input_tokens: Some(response.usage.cached_input as i64),
            thinking_tokens: Some(response.usage.thinking as i64),
            cost_cents: cost_cents as i64,
            latency_ms,
            status: UsageRecordStatus::Completed,
            timestamp: chrono::Utc::now(),
        };
        self.usage.record(record).await;

        self.events
            .emit(
                "agent.llm.completed",
                request.capsule,
                serde_json::json!({
                    "provider": request.provider,
                    "model": request.model,
                    "latencyMs": latency_ms,
                    "costCents": cost_cents,
                }),
            )
            .await;

        Ok(reversed)
    }
}

/// Convenience constructor for a registry with default breaker config,
/// matching how most callers will assemble a gateway at startup.
pub fn default_registry() -> Arc<ProviderRegistry> {
    Arc::new(ProviderRegistry::new(CircuitBreakerConfig::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::ScriptedAdapter;
    use crate::provider::{ProviderGenerateResponse, TokenUsage};
    use std::sync::Mutex;

    fn capsule() -> IdentityCapsule {
        IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: "conv-1".into(),
            agent_slug: "writer".into(),
            agent_type: "context".into(),
            provider: "openai".into(),
            model: "gpt-4o".into(),
            task_id: None,
            plan_id: None,
            deliverable_id: None,
        }
    }

    struct RecordingUsageSink {
        records: Mutex<Vec<UsageRecord>>,
    }

    #[async_trait]
    impl UsageSink for RecordingUsageSink {
        async fn record(&self, record: UsageRecord) {
            self.records.lock().unwrap().push(record);
        }
    }

    #[tokio::test]
    async fn generate_pseudonymizes_calls_provider_and_reverses() {
        let registry = Arc::new(ProviderRegistry::new(CircuitBreakerConfig::default()));
        let adapter = Arc::new(ScriptedAdapter::new(
            "openai",
            vec![Ok(ProviderGenerateResponse {
                text: "hello back".to_string(),
                usage: TokenUsage {
                    prompt: 10,
                    completion: 5,
                    ..Default::default()
                },
            })],
        ));
        registry.register(adapter.clone()).await;

        let usage_sink = Arc::new(RecordingUsageSink { records: Mutex::new(vec![]) });
        let gateway = LlmGateway::new(
            registry,
            PiiTransformer::default(),
            CostTable::seed_defaults(),
            LlmGatewayConfig::default(),
            Arc::new(NullEventSink),
            usage_sink.clone(),
        );

        let capsule = capsule();
        let request = GenerateRequest {
            capsule: &capsule,
            provider: "openai".into(),
            model: "gpt-4o".into(),
            system_prompt: "be helpful".into(),
            user_prompt: "hi there".into(),
            options: Default::default(),
            dictionary: None,
            caller_type: CallerType::Dispatcher,
            caller_name: "dispatcher".into(),
        };

        let result = gateway.generate(request, &CancellationToken::new()).await.unwrap();
        assert_eq!(result, "hello back");
        assert_eq!(adapter.call_count(), 1);
        assert_eq!(usage_sink.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generate_fails_fast_when_breaker_open() {
        let registry = Arc::new(ProviderRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            open_timeout: std::time::Duration::from_secs(60),
        }));
        let adapter = Arc::new(ScriptedAdapter::new(
            "openai",
            vec![Err(LlmError::UpstreamFailure {
                provider: "openai".into(),
                status: 500,
                message: "boom".into(),
            })],
        ));
        registry.register(adapter.clone()).await;
        registry.breaker("openai").await.record_failure();

        let gateway = LlmGateway::with_defaults(registry);
        let capsule = capsule();
        let request = GenerateRequest {
            capsule: &capsule,
            provider: "openai".into(),
            model: "gpt-4o".into(),
            system_prompt: "be helpful".into(),
            user_prompt: "hi there".into(),
            options: Default::default(),
            dictionary: None,
            caller_type: CallerType::Dispatcher,
            caller_name: "dispatcher".into(),
        };

        let err = gateway.generate(request, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, LlmError::UpstreamFailure { .. }));
        assert_eq!(adapter.call_count(), 0);
    }

    #[tokio::test]
    async fn generate_respects_cancellation() {
        let registry = Arc::new(ProviderRegistry::new(CircuitBreakerConfig::default()));
        let adapter = Arc::new(ScriptedAdapter::new("openai", vec![]));
        registry.register(adapter.clone()).await;

        let usage_sink = Arc::new(RecordingUsageSink { records: Mutex::new(vec![]) });
        let gateway = LlmGateway::new(
            registry,
            PiiTransformer::default(),
            CostTable::seed_defaults(),
            LlmGatewayConfig::default(),
            Arc::new(NullEventSink),
            usage_sink.clone(),
        );
        let capsule = capsule();
        let token = CancellationToken::new();
        token.cancel();
        let request = GenerateRequest {
            capsule: &capsule,
            provider: "openai".into(),
            model: "gpt-4o".into(),
            system_prompt: "be helpful".into(),
            user_prompt: "hi there".into(),
            options: Default::default(),
            dictionary: None,
            caller_type: CallerType::Dispatcher,
            caller_name: "dispatcher".into(),
        };

        let err = gateway.generate(request, &token).await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
        assert_eq!(adapter.call_count(), 0);

        // §4.4: a cancelled call still records usage, zeroed, rather than
        // omitting it entirely.
        let records = usage_sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, UsageRecordStatus::Cancelled);
        assert_eq!(records[0].prompt_tokens, 0);
        assert_eq!(records[0].completion_tokens, 0);
        assert_eq!(records[0].cost_cents, 0);
    }
}
