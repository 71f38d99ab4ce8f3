//! Data model entities (§3): pure structs, no behavior. Agents, Tasks,
//! Conversations, Plans/Deliverables and their versions, and the two
//! append-only logs (observability events, usage records).

use crate::capsule::IdentityCapsule;
use crate::identity::{
    ConversationId, DeliverableId, DeliverableVersionId, EntityIdType, ObservabilityEventId,
    PlanId, PlanVersionId, RegisteredAgentId, TaskId, Timestamp, UsageRecordId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of handler a runner implements (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RunnerType {
    Context,
    Api,
    External,
    Orchestrator,
    Rag,
    Media,
}

/// LLM configuration an agent carries for `context`-type runners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AgentLlmConfig {
    pub provider: String,
    pub model: String,
    pub system_prompt_template: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i64>,
}

/// Outbound HTTP endpoint configuration for `api`/`external` runners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AgentEndpoint {
    pub url: String,
    pub timeout_ms: Option<i64>,
    pub headers: HashMap<String, String>,
}

/// A registered agent (§3). Registered out of band; the core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: RegisteredAgentId,
    pub slug: String,
    pub org_slugs: Vec<String>,
    pub global: bool,
    pub runner_type: RunnerType,
    pub endpoint: Option<AgentEndpoint>,
    pub llm_config: Option<AgentLlmConfig>,
    /// Free-form I/O schema the agent advertises; validated by the Dispatcher, not parsed here.
    pub io_schema: serde_json::Value,
    /// Extra context injected into the assembled prompt for `context` runners.
    pub context: serde_json::Value,
}

impl Agent {
    /// Whether this agent may serve `org_slug` (§4.7 step 3).
    pub fn serves_org(&self, org_slug: &str) -> bool {
        self.global || self.org_slugs.iter().any(|s| s == org_slug)
    }
}

/// A conversation, created by the Dispatcher on first request if absent (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: String,
    pub agent_slug: String,
    pub started_at: Timestamp,
    pub last_active_at: Timestamp,
}

/// The mode a task/request executes in (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RunnerMode {
    Converse,
    Plan,
    Build,
    Hitl,
}

/// Task status (§3). Terminal statuses are write-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is write-once terminal (§3).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// One task per request (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub conversation_id: ConversationId,
    pub mode: RunnerMode,
    pub status: TaskStatus,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Who produced a plan/deliverable version's content (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum CreatedBy {
    Llm,
    User,
}

/// A single version of a plan's content (§3, §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PlanVersion {
    pub id: PlanVersionId,
    pub plan_id: PlanId,
    pub version_number: i64,
    pub content: String,
    pub format: String,
    pub created_by: CreatedBy,
    pub provider_model: Option<String>,
    pub created_at: Timestamp,
}

/// A plan (§3). Retains at least one version until the plan itself is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub conversation_id: ConversationId,
    pub title: String,
    pub current_version_id: PlanVersionId,
    pub created_at: Timestamp,
    pub deleted: bool,
}

/// A single version of a deliverable's content (§3, §4.2); same shape as
/// [`PlanVersion`] plus the deliverable's `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DeliverableVersion {
    pub id: DeliverableVersionId,
    pub deliverable_id: DeliverableId,
    pub version_number: i64,
    pub content: String,
    pub format: String,
    pub deliverable_type: String,
    pub created_by: CreatedBy,
    pub provider_model: Option<String>,
    pub created_at: Timestamp,
}

/// A deliverable (§3). Same invariants as [`Plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub id: DeliverableId,
    pub conversation_id: ConversationId,
    pub title: String,
    pub deliverable_type: String,
    pub current_version_id: DeliverableVersionId,
    pub deleted: bool,
}

/// A lifecycle event fanned out by the Observability Bus (§4.5). Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityEvent {
    pub id: ObservabilityEventId,
    pub capsule: IdentityCapsule,
    pub source_app: String,
    pub event_type: String,
    pub status: String,
    pub message: Option<String>,
    /// Percent complete, `0..=100` when present.
    pub progress: Option<u8>,
    pub step: Option<String>,
    pub payload: serde_json::Value,
    /// Resolved asynchronously by the bus's enrichment cache; absent until filled.
    pub user_display_name: Option<String>,
    pub timestamp: Timestamp,
}

/// Who invoked the LLM Gateway for a given call (§4.4 `callerType`/`callerName`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CallerType {
    Runner,
    Dispatcher,
    External,
}

/// Whether a [`UsageRecord`] reflects a call that actually completed (§4.4:
/// "cancellation after step 3 still records usage if the provider has
/// already billed for the in-flight call, otherwise records zero with
/// status=cancelled").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum UsageRecordStatus {
    Completed,
    Cancelled,
}

/// One LLM call's token/cost accounting (§3). Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: UsageRecordId,
    pub capsule: IdentityCapsule,
    pub provider: String,
    pub model: String,
    pub caller_type: CallerType,
    pub caller_name: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cached_input_tokens: Option<i64>,
    pub thinking_tokens: Option<i64>,
    pub cost_cents: i64,
    pub latency_ms: i64,
    pub status: UsageRecordStatus,
    pub timestamp: Timestamp,
}

/// Organization/agent-scoped pseudonym dictionary (§3, §4.3). Loaded at call
/// time by the PII Transformer; the core does not mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PiiDictionary {
    pub org_slug: String,
    pub agent_slug: String,
    /// Concrete string -> stable pseudonym.
    pub entries: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_terminal_classification_matches_spec() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn agent_serves_org_honors_global_flag() {
        let agent = Agent {
            id: RegisteredAgentId::now_v7(),
            slug: "writer".into(),
            org_slugs: vec!["acme".into()],
            global: false,
            runner_type: RunnerType::Context,
            endpoint: None,
            llm_config: None,
            io_schema: serde_json::json!({}),
            context: serde_json::json!({}),
        };
        assert!(agent.serves_org("acme"));
        assert!(!agent.serves_org("other"));

        let mut global_agent = agent.clone();
        global_agent.global = true;
        assert!(global_agent.serves_org("other"));
    }

    #[test]
    fn entity_structs_serialize_as_camel_case() {
        let conv = Conversation {
            id: ConversationId::now_v7(),
            user_id: "u1".into(),
            agent_slug: "writer".into(),
            started_at: chrono::Utc::now(),
            last_active_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&conv).unwrap();
        assert!(json.get("agentSlug").is_some());
        assert!(json.get("lastActiveAt").is_some());
    }
}
