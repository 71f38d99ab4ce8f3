//! The `context` runner type (§4.6): assemble context, compress to budget,
//! interpolate into the agent's template, one LLM call via C4, store the
//! output as a plan or deliverable.

use crate::runner::{map_llm_error, map_storage_error, Runner, RunnerOutput, RunnerRequest};
use aegis_core::{Agent, CallerType, CreatedBy, DeliverableVersionId, EntityIdType, IdentityCapsule, PlanVersionId, RunnerError, RunnerType};
use aegis_llm::{GenerateRequest, LlmGateway};
use aegis_storage::{ConversationStore, DeliverableStore, PlanStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Stand-in for a token budget: `agent.context` + the user message are
/// truncated to this many characters before interpolation, in the absence
/// of a tokenizer dependency anywhere else in the stack.
const CONTEXT_CHAR_BUDGET: usize = 8_000;

pub struct ContextRunner {
    llm: Arc<LlmGateway>,
    plans: Arc<PlanStore>,
    deliverables: Arc<DeliverableStore>,
}

impl ContextRunner {
    pub fn new(llm: Arc<LlmGateway>, plans: Arc<PlanStore>, deliverables: Arc<DeliverableStore>) -> Self {
        Self { llm, plans, deliverables }
    }

    fn action(request: &RunnerRequest) -> &str {
        request.payload.get("action").and_then(|v| v.as_str()).unwrap_or("create")
    }

    fn payload_id<T: EntityIdType>(request: &RunnerRequest, field: &str) -> Result<T, RunnerError> {
        let raw = request
            .payload
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| RunnerError::Internal(format!("payload.{field} is required")))?;
        T::from_str(raw).map_err(|_| RunnerError::Internal(format!("payload.{field} is not a valid id")))
    }

    fn payload_content(request: &RunnerRequest) -> Result<String, RunnerError> {
        request
            .payload
            .get("content")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| RunnerError::Internal("payload.content is required".to_string()))
    }

    fn assemble_context(agent: &Agent, request: &RunnerRequest) -> String {
        let mut parts = Vec::new();
        if !agent.context.is_null() {
            parts.push(agent.context.to_string());
        }
        if let Some(message) = &request.user_message {
            parts.push(message.clone());
        }
        let mut assembled = parts.join("\n\n");
        if assembled.len() > CONTEXT_CHAR_BUDGET {
            assembled.truncate(CONTEXT_CHAR_BUDGET);
        }
        assembled
    }

    async fn generate(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        extra_context: Option<&str>,
        cancellation: &CancellationToken,
    ) -> Result<(String, Option<String>), RunnerError> {
        self.generate_with_overrides(agent, request, capsule, extra_context, None, None, cancellation).await
    }

    /// Same as [`Self::generate`], but `rerunConfig.{provider, model,
    /// temperature}` (§4.2 `rerun`) takes precedence over the agent's own
    /// `llmConfig` when present.
    async fn generate_with_overrides(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        extra_context: Option<&str>,
        user_prompt_override: Option<&str>,
        rerun_config: Option<&serde_json::Value>,
        cancellation: &CancellationToken,
    ) -> Result<(String, Option<String>), RunnerError> {
        let llm_config = agent
            .llm_config
            .as_ref()
            .ok_or_else(|| RunnerError::Internal(format!("agent {} has no llmConfig", agent.slug)))?;

        let mut context = Self::assemble_context(agent, request);
        if let Some(extra) = extra_context {
            context = format!("{extra}\n\n{context}");
        }
        let system_prompt = if llm_config.system_prompt_template.contains("{{context}}") {
            llm_config.system_prompt_template.replace("{{context}}", &context)
        } else {
            format!("{}\n\n{}", llm_config.system_prompt_template, context)
        };
        let user_prompt = user_prompt_override
            .map(str::to_string)
            .unwrap_or_else(|| request.user_message.clone().unwrap_or_default());

        let provider = rerun_config
            .and_then(|c| c.get("provider"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| llm_config.provider.clone());
        let model = rerun_config
            .and_then(|c| c.get("model"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| llm_config.model.clone());
        let temperature = rerun_config
            .and_then(|c| c.get("temperature"))
            .and_then(|v| v.as_f64())
            .or(llm_config.temperature);

        let mut options = HashMap::new();
        if let Some(temperature) = temperature {
            options.insert("temperature".to_string(), serde_json::json!(temperature));
        }
        if let Some(max_tokens) = llm_config.max_tokens {
            options.insert("maxTokens".to_string(), serde_json::json!(max_tokens));
        }

        let content = self
            .llm
            .generate(
                GenerateRequest {
                    capsule,
                    provider: provider.clone(),
                    model: model.clone(),
                    system_prompt,
                    user_prompt,
                    options,
                    dictionary: None,
                    caller_type: CallerType::Runner,
                    caller_name: agent.slug.clone(),
                },
                cancellation,
            )
            .await
            .map_err(map_llm_error)?;

        let provider_model = Some(format!("{provider}/{model}"));
        Ok((content, provider_model))
    }
}

#[async_trait]
impl Runner for ContextRunner {
    fn runner_type(&self) -> RunnerType {
        RunnerType::Context
    }

    async fn handle_converse(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        let (content, _) = self.generate(agent, request, capsule, None, cancellation).await?;
        Ok(RunnerOutput::text(content))
    }

    async fn handle_plan(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        match Self::action(request) {
            "create" => {
                let (content, provider_model) = self.generate(agent, request, capsule, None, cancellation).await?;
                let title = request
                    .payload
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Plan")
                    .to_string();
                let plan = self
                    .plans
                    .create(capsule, title, content.clone(), "markdown".to_string(), CreatedBy::Llm, provider_model)
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content,
                    payload: serde_json::json!({
                        "planId": plan.id.to_string(),
                        "versionId": plan.current_version_id.to_string(),
                    }),
                })
            }
            "read" => {
                let plan_id = Self::payload_id(request, "planId")?;
                let found = self.plans.read(plan_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: found.current_version.content.clone(),
                    payload: serde_json::to_value(&found).unwrap_or_default(),
                })
            }
            "list" => {
                let plan_id = Self::payload_id(request, "planId")?;
                let versions = self.plans.list(plan_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: String::new(),
                    payload: serde_json::json!({"versions": versions}),
                })
            }
            "edit" => {
                let plan_id = Self::payload_id(request, "planId")?;
                let content = Self::payload_content(request)?;
                let plan = self.plans.edit(capsule, plan_id, content.clone()).await.map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content,
                    payload: serde_json::json!({"planId": plan.id.to_string(), "versionId": plan.current_version_id.to_string()}),
                })
            }
            "rerun" => {
                let plan_id = Self::payload_id(request, "planId")?;
                let base_version_id: PlanVersionId = Self::payload_id(request, "versionId")?;
                let rerun_config = request.payload.get("rerunConfig").cloned();
                let (content, provider_model) = self
                    .generate_with_overrides(agent, request, capsule, None, None, rerun_config.as_ref(), cancellation)
                    .await?;
                let plan = self
                    .plans
                    .rerun_with_content(capsule, plan_id, base_version_id, content.clone(), provider_model)
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content,
                    payload: serde_json::json!({"planId": plan.id.to_string(), "versionId": plan.current_version_id.to_string()}),
                })
            }
            "set_current" => {
                let plan_id = Self::payload_id(request, "planId")?;
                let version_id = Self::payload_id(request, "versionId")?;
                let plan = self.plans.set_current(capsule, plan_id, version_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput::text(format!("plan {} now at version {}", plan.id, plan.current_version_id)))
            }
            "copy_version" => {
                let plan_id = Self::payload_id(request, "planId")?;
                let version_id = Self::payload_id(request, "versionId")?;
                let plan = self.plans.copy_version(capsule, plan_id, version_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: String::new(),
                    payload: serde_json::json!({"planId": plan.id.to_string(), "versionId": plan.current_version_id.to_string()}),
                })
            }
            "delete_version" => {
                let plan_id = Self::payload_id(request, "planId")?;
                let version_id = Self::payload_id(request, "versionId")?;
                let plan = self.plans.delete_version(capsule, plan_id, version_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: String::new(),
                    payload: serde_json::json!({"planId": plan.id.to_string(), "versionId": plan.current_version_id.to_string()}),
                })
            }
            "delete" => {
                let plan_id = Self::payload_id(request, "planId")?;
                self.plans.delete(capsule, plan_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput::text("deleted"))
            }
            other => Err(RunnerError::Internal(format!("unknown plan action: {other}"))),
        }
    }

    async fn handle_build(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        match Self::action(request) {
            "create" => {
                // Plan -> Build coupling rule (§4.2): a runner executing
                // build.create must fetch the conversation's current plan,
                // if any, as context.
                let conversation_id = ConversationStore::parse_id(&capsule.conversation_id).map_err(map_storage_error)?;
                let plan_context = self
                    .plans
                    .current_for_conversation(conversation_id)
                    .await
                    .map(|p| p.current_version.content);

                let (content, provider_model) = self
                    .generate(agent, request, capsule, plan_context.as_deref(), cancellation)
                    .await?;
                let title = request
                    .payload
                    .get("title")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Deliverable")
                    .to_string();
                let deliverable_type = request
                    .payload
                    .get("deliverableType")
                    .and_then(|v| v.as_str())
                    .unwrap_or("document")
                    .to_string();
                let deliverable = self
                    .deliverables
                    .create(
                        capsule,
                        title,
                        deliverable_type,
                        content.clone(),
                        "markdown".to_string(),
                        CreatedBy::Llm,
                        provider_model,
                    )
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content,
                    payload: serde_json::json!({
                        "deliverableId": deliverable.id.to_string(),
                        "versionId": deliverable.current_version_id.to_string(),
                    }),
                })
            }
            "read" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let found = self.deliverables.read(deliverable_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: found.current_version.content.clone(),
                    payload: serde_json::to_value(&found).unwrap_or_default(),
                })
            }
            "list" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let versions = self.deliverables.list(deliverable_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: String::new(),
                    payload: serde_json::json!({"versions": versions}),
                })
            }
            "edit" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let content = Self::payload_content(request)?;
                let deliverable = self
                    .deliverables
                    .edit(capsule, deliverable_id, content.clone())
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content,
                    payload: serde_json::json!({"deliverableId": deliverable.id.to_string(), "versionId": deliverable.current_version_id.to_string()}),
                })
            }
            "rerun" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let base_version_id: DeliverableVersionId = Self::payload_id(request, "versionId")?;
                let rerun_config = request.payload.get("rerunConfig").cloned();
                let (content, provider_model) = self
                    .generate_with_overrides(agent, request, capsule, None, None, rerun_config.as_ref(), cancellation)
                    .await?;
                let deliverable = self
                    .deliverables
                    .rerun_with_content(capsule, deliverable_id, base_version_id, content.clone(), provider_model)
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content,
                    payload: serde_json::json!({"deliverableId": deliverable.id.to_string(), "versionId": deliverable.current_version_id.to_string()}),
                })
            }
            "merge_versions" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let version_ids: Vec<DeliverableVersionId> = request
                    .payload
                    .get("versionIds")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| RunnerError::Internal("payload.versionIds is required".to_string()))?
                    .iter()
                    .map(|v| v.as_str().and_then(|s| DeliverableVersionId::from_str(s).ok()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| RunnerError::Internal("payload.versionIds contains an invalid id".to_string()))?;
                let merge_prompt = request.payload.get("mergePrompt").and_then(|v| v.as_str());
                let (content, provider_model) = self
                    .generate_with_overrides(agent, request, capsule, None, merge_prompt, None, cancellation)
                    .await?;
                let deliverable = self
                    .deliverables
                    .merge_versions(capsule, deliverable_id, &version_ids, content.clone(), provider_model)
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content,
                    payload: serde_json::json!({"deliverableId": deliverable.id.to_string(), "versionId": deliverable.current_version_id.to_string()}),
                })
            }
            "set_current" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let version_id = Self::payload_id(request, "versionId")?;
                let deliverable = self
                    .deliverables
                    .set_current(capsule, deliverable_id, version_id)
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput::text(format!(
                    "deliverable {} now at version {}",
                    deliverable.id, deliverable.current_version_id
                )))
            }
            "copy_version" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let version_id = Self::payload_id(request, "versionId")?;
                let deliverable = self
                    .deliverables
                    .copy_version(capsule, deliverable_id, version_id)
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: String::new(),
                    payload: serde_json::json!({"deliverableId": deliverable.id.to_string(), "versionId": deliverable.current_version_id.to_string()}),
                })
            }
            "delete_version" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                let version_id = Self::payload_id(request, "versionId")?;
                let deliverable = self
                    .deliverables
                    .delete_version(capsule, deliverable_id, version_id)
                    .await
                    .map_err(map_storage_error)?;
                Ok(RunnerOutput {
                    content: String::new(),
                    payload: serde_json::json!({"deliverableId": deliverable.id.to_string(), "versionId": deliverable.current_version_id.to_string()}),
                })
            }
            "delete" => {
                let deliverable_id = Self::payload_id(request, "deliverableId")?;
                self.deliverables.delete(capsule, deliverable_id).await.map_err(map_storage_error)?;
                Ok(RunnerOutput::text("deleted"))
            }
            other => Err(RunnerError::Internal(format!("unknown build action: {other}"))),
        }
    }

    async fn handle_hitl(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        // No distinct human-in-the-loop behavior is specified beyond the
        // mode name; treated as a conversational call, nothing persisted.
        self.handle_converse(agent, request, capsule, cancellation).await
    }
}
