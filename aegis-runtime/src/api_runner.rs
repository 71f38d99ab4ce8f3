//! The `api` runner type (§4.6): forwards every mode to an agent's endpoint
//! as a plain REST call, the way `external` forwards to one over A2A
//! JSON-RPC. Distinguished from `external` in that the backend is a bespoke
//! HTTP API the agent owns, not a JSON-RPC-speaking peer agent; no
//! discovery, no envelope beyond a JSON body.

use crate::runner::{Runner, RunnerOutput, RunnerRequest};
use aegis_core::{Agent, IdentityCapsule, RunnerError, RunnerType};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_TIMEOUT_MS: i64 = 30_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRunnerResponse {
    content: String,
    #[serde(default)]
    payload: serde_json::Value,
}

pub struct ApiRunner {
    http: reqwest::Client,
}

impl ApiRunner {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
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
        let timeout = Duration::from_millis(endpoint.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS) as u64);

        let mut req = self.http.post(&endpoint.url).timeout(timeout).json(&serde_json::json!({
            "mode": request.mode,
            "userMessage": request.user_message,
            "payload": request.payload,
            "capsule": capsule,
        }));
        for (key, value) in &endpoint.headers {
            req = req.header(key, value);
        }

        let response: ApiRunnerResponse = req
            .send()
            .await
            .map_err(|err| RunnerError::UpstreamFailure(err.to_string()))?
            .json()
            .await
            .map_err(|err| RunnerError::UpstreamFailure(err.to_string()))?;

        Ok(RunnerOutput { content: response.content, payload: response.payload })
    }
}

#[async_trait]
impl Runner for ApiRunner {
    fn runner_type(&self) -> RunnerType {
        RunnerType::Api
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
    use aegis_core::RegisteredAgentId;
    use aegis_core::EntityIdType;

    #[tokio::test]
    async fn missing_endpoint_is_internal_error() {
        let runner = ApiRunner::new(reqwest::Client::new());
        let agent = Agent {
            id: RegisteredAgentId::now_v7(),
            slug: "legacy".into(),
            org_slugs: vec!["acme".into()],
            global: false,
            runner_type: RunnerType::Api,
            endpoint: None,
            llm_config: None,
            io_schema: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        let request = RunnerRequest {
            mode: aegis_core::RunnerMode::Converse,
            user_message: Some("hi".into()),
            payload: serde_json::json!({}),
        };
        let capsule = IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: aegis_core::ConversationId::now_v7().to_string(),
            agent_slug: "legacy".into(),
            agent_type: "api".into(),
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
