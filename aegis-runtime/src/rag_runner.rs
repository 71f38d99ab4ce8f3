//! The `rag` runner type (§4.6): augments the prompt with passages pulled
//! from a retrieval store before making the single LLM call every `context`
//! runner makes. Retrieval itself is out of scope (§2 Non-goals list
//! "embedding implementations" explicitly) so this crate only defines the
//! seam a concrete vector store plugs into.

use crate::runner::{map_llm_error, Runner, RunnerOutput, RunnerRequest};
use aegis_core::{Agent, CallerType, IdentityCapsule, RunnerError, RunnerType};
use aegis_llm::{GenerateRequest, LlmGateway};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A retrieved passage, scored and ready to fold into the prompt.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub text: String,
    pub score: f32,
}

/// Whatever indexes and searches the agent's corpus. Injected so this crate
/// never depends on a concrete vector-store client.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    async fn search(&self, agent_slug: &str, query: &str, top_k: usize) -> Vec<RetrievedPassage>;
}

const DEFAULT_TOP_K: usize = 5;

pub struct RagRunner {
    llm: Arc<LlmGateway>,
    retrieval: Arc<dyn RetrievalStore>,
}

impl RagRunner {
    pub fn new(llm: Arc<LlmGateway>, retrieval: Arc<dyn RetrievalStore>) -> Self {
        Self { llm, retrieval }
    }
}

#[async_trait]
impl Runner for RagRunner {
    fn runner_type(&self) -> RunnerType {
        RunnerType::Rag
    }

    async fn handle_converse(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        let llm_config = agent
            .llm_config
            .as_ref()
            .ok_or_else(|| RunnerError::Internal(format!("agent {} has no llmConfig", agent.slug)))?;
        let query = request.user_message.clone().unwrap_or_default();
        let top_k = request
            .payload
            .get("topK")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_TOP_K);

        let passages = self.retrieval.search(&agent.slug, &query, top_k).await;
        let context = passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] (score {:.3}) {}", i + 1, p.score, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let system_prompt = if llm_config.system_prompt_template.contains("{{context}}") {
            llm_config.system_prompt_template.replace("{{context}}", &context)
        } else {
            format!("{}\n\nRetrieved context:\n{}", llm_config.system_prompt_template, context)
        };

        let content = self
            .llm
            .generate(
                GenerateRequest {
                    capsule,
                    provider: llm_config.provider.clone(),
                    model: llm_config.model.clone(),
                    system_prompt,
                    user_prompt: query,
                    options: Default::default(),
                    dictionary: None,
                    caller_type: CallerType::Runner,
                    caller_name: agent.slug.clone(),
                },
                cancellation,
            )
            .await
            .map_err(map_llm_error)?;

        Ok(RunnerOutput {
            content,
            payload: serde_json::json!({
                "passagesUsed": passages.len(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{AgentLlmConfig, RegisteredAgentId};
    use aegis_core::EntityIdType;
    use aegis_llm::{CircuitBreakerConfig, LlmProviderAdapter, ProviderGenerateRequest, ProviderGenerateResponse, ProviderRegistry, TokenUsage};

    struct EchoAdapter;

    #[async_trait]
    impl LlmProviderAdapter for EchoAdapter {
        fn provider_id(&self) -> &str {
            "openai"
        }

        async fn generate(&self, request: ProviderGenerateRequest) -> Result<ProviderGenerateResponse, aegis_core::LlmError> {
            Ok(ProviderGenerateResponse {
                text: format!("answer using: {}", request.system_prompt),
                usage: TokenUsage::default(),
            })
        }
    }

    struct StubRetrieval;

    #[async_trait]
    impl RetrievalStore for StubRetrieval {
        async fn search(&self, _agent_slug: &str, _query: &str, _top_k: usize) -> Vec<RetrievedPassage> {
            vec![RetrievedPassage { text: "rust is memory safe".into(), score: 0.9 }]
        }
    }

    #[tokio::test]
    async fn converse_folds_retrieved_passages_into_the_prompt() {
        let registry = Arc::new(ProviderRegistry::new(CircuitBreakerConfig::default()));
        registry.register(Arc::new(EchoAdapter)).await;
        let llm = Arc::new(LlmGateway::with_defaults(registry));
        let runner = RagRunner::new(llm, Arc::new(StubRetrieval));

        let agent = Agent {
            id: RegisteredAgentId::now_v7(),
            slug: "kb".into(),
            org_slugs: vec!["acme".into()],
            global: false,
            runner_type: RunnerType::Rag,
            endpoint: None,
            llm_config: Some(AgentLlmConfig {
                provider: "openai".into(),
                model: "gpt-5".into(),
                system_prompt_template: "Answer from context: {{context}}".into(),
                temperature: None,
                max_tokens: None,
            }),
            io_schema: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        let request = RunnerRequest {
            mode: aegis_core::RunnerMode::Converse,
            user_message: Some("is rust safe?".into()),
            payload: serde_json::json!({}),
        };
        let capsule = IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: aegis_core::ConversationId::now_v7().to_string(),
            agent_slug: "kb".into(),
            agent_type: "rag".into(),
            provider: "openai".into(),
            model: "gpt-5".into(),
            task_id: None,
            plan_id: None,
            deliverable_id: None,
        };
        let output = runner.execute(&agent, &request, &capsule, &CancellationToken::new()).await.unwrap();
        assert!(output.content.contains("memory safe"));
        assert_eq!(output.payload["passagesUsed"], 1);
    }
}
