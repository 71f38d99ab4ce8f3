//! The `orchestrator` runner type (§4.6): fans a request out to one or more
//! sub-agents by slug and folds their outputs into one response. Each
//! sub-call goes back through the registry/A2A path exactly like a
//! top-level dispatch would, so an orchestrator never special-cases how a
//! sub-agent is reached.

use crate::registry::RunnerRegistry;
use crate::runner::{Runner, RunnerOutput, RunnerRequest};
use aegis_core::{Agent, IdentityCapsule, RunnerError, RunnerType};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Looks an agent up by slug within the caller's org; implemented by
/// whatever holds the agent registry (`aegis-api`'s `AppState`, in
/// practice), so this crate never owns agent storage itself.
#[async_trait]
pub trait SubAgentDirectory: Send + Sync {
    async fn find(&self, org_slug: &str, agent_slug: &str) -> Option<Agent>;
}

pub struct OrchestratorRunner {
    directory: Arc<dyn SubAgentDirectory>,
    registry: Arc<RunnerRegistry>,
}

impl OrchestratorRunner {
    pub fn new(directory: Arc<dyn SubAgentDirectory>, registry: Arc<RunnerRegistry>) -> Self {
        Self { directory, registry }
    }

    async fn run_sub_agent(
        &self,
        org_slug: &str,
        sub_agent_slug: &str,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        let sub_agent = self
            .directory
            .find(org_slug, sub_agent_slug)
            .await
            .ok_or_else(|| RunnerError::Internal(format!("sub-agent {sub_agent_slug} not found for org {org_slug}")))?;
        let runner = self.registry.resolve(sub_agent.runner_type).await?;
        runner.execute(&sub_agent, request, capsule, cancellation).await
    }
}

#[async_trait]
impl Runner for OrchestratorRunner {
    fn runner_type(&self) -> RunnerType {
        RunnerType::Orchestrator
    }

    async fn handle_converse(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        let sub_agent_slugs: Vec<String> = request
            .payload
            .get("subAgents")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if sub_agent_slugs.is_empty() {
            return Err(RunnerError::Internal("orchestrator requires payload.subAgents".to_string()));
        }

        let mut combined = String::new();
        let mut payloads = Vec::with_capacity(sub_agent_slugs.len());
        for sub_agent_slug in &sub_agent_slugs {
            let output = self
                .run_sub_agent(&agent.org_slugs[0], sub_agent_slug, request, capsule, cancellation)
                .await?;
            if !combined.is_empty() {
                combined.push_str("\n\n");
            }
            combined.push_str(&output.content);
            payloads.push(serde_json::json!({"agent": sub_agent_slug, "payload": output.payload}));
        }

        Ok(RunnerOutput {
            content: combined,
            payload: serde_json::json!({"subAgentResults": payloads}),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{AgentLlmConfig, RegisteredAgentId};
    use aegis_core::EntityIdType;

    struct StubDirectory;

    #[async_trait]
    impl SubAgentDirectory for StubDirectory {
        async fn find(&self, _org_slug: &str, agent_slug: &str) -> Option<Agent> {
            Some(Agent {
                id: RegisteredAgentId::now_v7(),
                slug: agent_slug.to_string(),
                org_slugs: vec!["acme".into()],
                global: false,
                runner_type: RunnerType::Context,
                endpoint: None,
                llm_config: Some(AgentLlmConfig {
                    provider: "openai".into(),
                    model: "gpt-5".into(),
                    system_prompt_template: "{{context}}".into(),
                    temperature: None,
                    max_tokens: None,
                }),
                io_schema: serde_json::json!({}),
                context: serde_json::json!({}),
            })
        }
    }

    #[tokio::test]
    async fn missing_sub_agents_payload_is_an_error() {
        let runner = OrchestratorRunner::new(Arc::new(StubDirectory), Arc::new(RunnerRegistry::new()));
        let agent = Agent {
            id: RegisteredAgentId::now_v7(),
            slug: "lead".into(),
            org_slugs: vec!["acme".into()],
            global: false,
            runner_type: RunnerType::Orchestrator,
            endpoint: None,
            llm_config: None,
            io_schema: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        let request = RunnerRequest {
            mode: aegis_core::RunnerMode::Converse,
            user_message: Some("go".into()),
            payload: serde_json::json!({}),
        };
        let capsule = IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: aegis_core::ConversationId::now_v7().to_string(),
            agent_slug: "lead".into(),
            agent_type: "orchestrator".into(),
            provider: "none".into(),
            model: "none".into(),
            task_id: None,
            plan_id: None,
            deliverable_id: None,
        };
        let err = runner.execute(&agent, &request, &capsule, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Internal(_)));
    }
}
