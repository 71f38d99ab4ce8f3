//! The `external` runner type (§4.6/§4.8): forwards every mode uniformly to
//! an agent reachable only over the A2A JSON-RPC transport.

use crate::a2a::A2aClient;
use crate::runner::{Runner, RunnerOutput, RunnerRequest};
use aegis_core::{Agent, IdentityCapsule, RunnerError, RunnerType};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct ExternalRunner {
    client: Arc<A2aClient>,
}

impl ExternalRunner {
    pub fn new(client: Arc<A2aClient>) -> Self {
        Self { client }
    }

    fn mode_str(mode: aegis_core::RunnerMode) -> &'static str {
        match mode {
            aegis_core::RunnerMode::Converse => "converse",
            aegis_core::RunnerMode::Plan => "plan",
            aegis_core::RunnerMode::Build => "build",
            aegis_core::RunnerMode::Hitl => "hitl",
        }
    }

    async fn forward(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
    ) -> Result<RunnerOutput, RunnerError> {
        let endpoint = agent
            .endpoint
            .as_ref()
            .ok_or_else(|| RunnerError::Internal(format!("agent {} has no endpoint", agent.slug)))?;

        let action = request
            .payload
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RunnerError::Internal("request.payload.action is required".to_string()))?;
        let method = format!("{}.{}", Self::mode_str(request.mode), action);

        let params = serde_json::json!({
            "capsule": capsule,
            "userMessage": request.user_message,
            "payload": request.payload,
        });

        let result = self
            .client
            .call(&endpoint.url, &method, params)
            .await
            .map_err(|err| RunnerError::UpstreamFailure(err.to_string()))?;

        let content = result
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let payload = result.get("payload").cloned().unwrap_or_else(|| serde_json::json!({}));
        Ok(RunnerOutput { content, payload })
    }
}

#[async_trait]
impl Runner for ExternalRunner {
    fn runner_type(&self) -> RunnerType {
        RunnerType::External
    }

    async fn handle_converse(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        self.forward(agent, request, capsule).await
    }

    async fn handle_plan(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        self.forward(agent, request, capsule).await
    }

    async fn handle_build(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        self.forward(agent, request, capsule).await
    }

    async fn handle_hitl(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        self.forward(agent, request, capsule).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{AgentEndpoint, RegisteredAgentId};
    use aegis_core::EntityIdType;

    fn agent(endpoint: Option<AgentEndpoint>) -> Agent {
        Agent {
            id: RegisteredAgentId::now_v7(),
            slug: "remote".into(),
            org_slugs: vec!["acme".into()],
            global: false,
            runner_type: RunnerType::External,
            endpoint,
            llm_config: None,
            io_schema: serde_json::json!({}),
            context: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn missing_endpoint_is_internal_error() {
        let runner = ExternalRunner::new(Arc::new(A2aClient::default()));
        let agent = agent(None);
        let request = RunnerRequest {
            mode: aegis_core::RunnerMode::Converse,
            user_message: Some("hi".into()),
            payload: serde_json::json!({"action": "message"}),
        };
        let capsule_conversation_id = aegis_core::ConversationId::now_v7().to_string();
        let capsule = IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: capsule_conversation_id,
            agent_slug: "remote".into(),
            agent_type: "external".into(),
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
