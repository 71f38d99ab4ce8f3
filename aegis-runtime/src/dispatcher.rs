//! The Dispatcher (C7, §4.7): the eight-step contract every inbound task
//! request goes through between the HTTP edge and a runner.

use crate::config::DispatcherConfig;
use crate::registry::RunnerRegistry;
use crate::runner::{RunnerOutput, RunnerRequest};
use aegis_core::{Agent, DispatchError, IdentityCapsule, RunnerMode, TaskStatus};
use aegis_llm::{EventSink, NullEventSink};
use aegis_storage::{ConversationStore, TaskStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// `(orgSlug, agentSlug) -> Agent` lookup (§4.7 step 3). Implemented by
/// whatever owns agent registration out of band (`aegis-api`'s `AppState`
/// in practice) — this crate never stores agents itself.
#[async_trait::async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn find(&self, org_slug: &str, agent_slug: &str) -> Option<Agent>;
}

/// Inbound request body (§6): `POST /agents/{org}/{agentSlug}/tasks`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub mode: RunnerMode,
    pub user_message: Option<String>,
    pub payload: serde_json::Value,
}

/// Response envelope (§6): echoes the (possibly capsule-mutated) context
/// back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub success: bool,
    pub payload: serde_json::Value,
    pub context: IdentityCapsule,
}

pub struct Dispatcher {
    agents: Arc<dyn AgentDirectory>,
    runners: Arc<RunnerRegistry>,
    conversations: Arc<ConversationStore>,
    tasks: Arc<TaskStore>,
    events: Arc<dyn EventSink>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        agents: Arc<dyn AgentDirectory>,
        runners: Arc<RunnerRegistry>,
        conversations: Arc<ConversationStore>,
        tasks: Arc<TaskStore>,
        events: Arc<dyn EventSink>,
        config: DispatcherConfig,
    ) -> Self {
        Self { agents, runners, conversations, tasks, events, config }
    }

    pub fn with_defaults(
        agents: Arc<dyn AgentDirectory>,
        runners: Arc<RunnerRegistry>,
        conversations: Arc<ConversationStore>,
        tasks: Arc<TaskStore>,
    ) -> Self {
        Self::new(agents, runners, conversations, tasks, Arc::new(NullEventSink), DispatcherConfig::default())
    }

    /// The §4.7 eight-step contract.
    pub async fn dispatch(
        &self,
        org_slug: &str,
        agent_slug: &str,
        request: TaskRequest,
        mut capsule: IdentityCapsule,
        authenticated_user_id: &str,
    ) -> Result<TaskResponse, DispatchError> {
        // 1. Parse request; require mode, payload.action, and a capsule.
        if request.payload.get("action").and_then(|v| v.as_str()).is_none() {
            return Err(DispatchError::BadRequest("payload.action is required".to_string()));
        }

        // 2. Enforce capsule rules: the authenticated subject must equal userId.
        if capsule.user_id != authenticated_user_id {
            return Err(DispatchError::Unauthorized);
        }

        // 3. Load agent by (orgSlug, agentSlug); it must serve this org.
        let agent = self
            .agents
            .find(org_slug, agent_slug)
            .await
            .filter(|agent| agent.serves_org(org_slug))
            .ok_or_else(|| DispatchError::AgentNotFound(format!("{org_slug}/{agent_slug}")))?;

        // 4. Resolve the runner for this agent's runner type.
        let runner = self.runners.resolve(agent.runner_type).await.map_err(DispatchError::from)?;

        // 5. Ensure Task/Conversation rows exist, start the task, emit task.started.
        let conversation_id = ConversationStore::parse_id(&capsule.conversation_id)
            .map_err(|err| DispatchError::BadRequest(err.to_string()))?;
        let conversation = self.conversations.ensure(conversation_id, &capsule.user_id, &agent.slug).await;
        let task = self.tasks.create(conversation.id, request.mode).await;
        capsule
            .try_assign_task_id(task.id)
            .map_err(|err| DispatchError::BadRequest(err.to_string()))?;
        let _ = self.tasks.set_status(task.id, TaskStatus::Running).await;
        self.events
            .emit(
                "task.started",
                &capsule,
                serde_json::json!({"taskId": task.id.to_string(), "mode": request.mode}),
            )
            .await;

        let runner_request = RunnerRequest {
            mode: request.mode,
            user_message: request.user_message,
            payload: request.payload,
        };
        let cancellation = CancellationToken::new();

        // 6. Invoke runner.execute, bounded by T_dispatch.
        let outcome = tokio::time::timeout(
            self.config.dispatch_timeout,
            runner.execute(&agent, &runner_request, &capsule, &cancellation),
        )
        .await;

        // 7. Emit task.completed/task.failed.
        let result = match outcome {
            Ok(Ok(output)) => {
                let _ = self.tasks.set_status(task.id, TaskStatus::Succeeded).await;
                self.events
                    .emit("task.completed", &capsule, serde_json::json!({"taskId": task.id.to_string()}))
                    .await;
                Ok(output)
            }
            Ok(Err(err)) => {
                let _ = self.tasks.set_status(task.id, TaskStatus::Failed).await;
                self.events
                    .emit(
                        "task.failed",
                        &capsule,
                        serde_json::json!({"taskId": task.id.to_string(), "error": err.to_string()}),
                    )
                    .await;
                Err(DispatchError::from(err))
            }
            Err(_) => {
                cancellation.cancel();
                let _ = self.tasks.set_status(task.id, TaskStatus::Failed).await;
                self.events
                    .emit(
                        "task.failed",
                        &capsule,
                        serde_json::json!({"taskId": task.id.to_string(), "error": "dispatch timeout"}),
                    )
                    .await;
                Err(DispatchError::Timeout(self.config.dispatch_timeout.as_millis() as u64))
            }
        };

        // 8. Return the response envelope echoing capsule.
        result.map(|output: RunnerOutput| TaskResponse {
            success: true,
            payload: serde_json::json!({"content": output.content, "data": output.payload}),
            context: capsule,
        })
    }
}
