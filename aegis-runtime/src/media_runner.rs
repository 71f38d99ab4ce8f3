//! The `media` runner type (§4.6): calls an agent's configured media
//! generation endpoint directly over HTTP (no A2A envelope — media backends
//! are plain REST, not JSON-RPC agents) and records the resulting asset URL
//! as a deliverable.

use crate::runner::{map_storage_error, Runner, RunnerOutput, RunnerRequest};
use aegis_core::{Agent, CreatedBy, IdentityCapsule, RunnerError, RunnerType};
use aegis_storage::DeliverableStore;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaGenerationResponse {
    url: String,
    #[serde(default)]
    media_type: Option<String>,
}

pub struct MediaRunner {
    http: reqwest::Client,
    deliverables: Arc<DeliverableStore>,
}

impl MediaRunner {
    pub fn new(http: reqwest::Client, deliverables: Arc<DeliverableStore>) -> Self {
        Self { http, deliverables }
    }
}

#[async_trait]
impl Runner for MediaRunner {
    fn runner_type(&self) -> RunnerType {
        RunnerType::Media
    }

    async fn handle_build(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        let endpoint = agent
            .endpoint
            .as_ref()
            .ok_or_else(|| RunnerError::Internal(format!("agent {} has no endpoint", agent.slug)))?;
        let timeout = Duration::from_millis(endpoint.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS as i64) as u64);

        let mut req = self.http.post(&endpoint.url).timeout(timeout).json(&serde_json::json!({
            "prompt": request.user_message,
            "payload": request.payload,
        }));
        for (key, value) in &endpoint.headers {
            req = req.header(key, value);
        }

        let response = req
            .send()
            .await
            .map_err(|err| RunnerError::UpstreamFailure(err.to_string()))?
            .json::<MediaGenerationResponse>()
            .await
            .map_err(|err| RunnerError::UpstreamFailure(err.to_string()))?;

        let title = request
            .payload
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Generated media")
            .to_string();
        let deliverable_type = response.media_type.clone().unwrap_or_else(|| "media".to_string());

        let deliverable = self
            .deliverables
            .create(
                capsule,
                title,
                deliverable_type,
                response.url.clone(),
                "url".to_string(),
                CreatedBy::Llm,
                None,
            )
            .await
            .map_err(map_storage_error)?;

        Ok(RunnerOutput {
            content: response.url,
            payload: serde_json::json!({
                "deliverableId": deliverable.id.to_string(),
                "versionId": deliverable.current_version_id.to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::RegisteredAgentId;
    use aegis_core::EntityIdType;
    use aegis_storage::NullStorageEventSink;

    #[tokio::test]
    async fn missing_endpoint_is_internal_error() {
        let runner = MediaRunner::new(reqwest::Client::new(), Arc::new(DeliverableStore::new(Arc::new(NullStorageEventSink))));
        let agent = Agent {
            id: RegisteredAgentId::now_v7(),
            slug: "image-gen".into(),
            org_slugs: vec!["acme".into()],
            global: false,
            runner_type: RunnerType::Media,
            endpoint: None,
            llm_config: None,
            io_schema: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        let request = RunnerRequest {
            mode: aegis_core::RunnerMode::Build,
            user_message: Some("a red fox".into()),
            payload: serde_json::json!({}),
        };
        let capsule = IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: aegis_core::ConversationId::now_v7().to_string(),
            agent_slug: "image-gen".into(),
            agent_type: "media".into(),
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
