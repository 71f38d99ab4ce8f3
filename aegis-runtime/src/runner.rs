//! Base Runner (§4.6): the four-mode dispatch every runner type shares, and
//! the request/response shapes that cross it.

use aegis_core::{Agent, IdentityCapsule, LlmError, RunnerMode, RunnerError, RunnerType, StorageError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Runner types share one LLM Gateway error surface; this keeps every
/// `handle_*` method's signature down to a single error type.
pub fn map_llm_error(err: LlmError) -> RunnerError {
    match err {
        LlmError::Unconfigured => RunnerError::Unconfigured("llm gateway unconfigured".to_string()),
        LlmError::Timeout { .. } => RunnerError::Timeout,
        LlmError::UpstreamFailure { provider, status, message } => {
            RunnerError::UpstreamFailure(format!("{provider} returned {status}: {message}"))
        }
        LlmError::Cancelled => RunnerError::Cancelled,
        LlmError::Internal(message) => RunnerError::Internal(message),
    }
}

/// Preserves the Artifact Store's `NotFound`/`Conflict` distinction rather
/// than flattening every failure to an upstream call error.
pub fn map_storage_error(err: StorageError) -> RunnerError {
    match err {
        StorageError::ConversationNotFound(_) | StorageError::NotFound { .. } | StorageError::VersionNotFound(_) => {
            RunnerError::NotFound(err.to_string())
        }
        StorageError::CannotDeleteLast(_) | StorageError::QuotaExceeded(_) => {
            RunnerError::BadRequest(err.to_string())
        }
        StorageError::Conflict { .. } => RunnerError::Conflict(err.to_string()),
        StorageError::LockPoisoned => RunnerError::Internal(err.to_string()),
    }
}

/// One runner invocation (§4.6). `payload` carries the mode-specific fields
/// (`action`, `llmSelection`, endpoint overrides, …) the Dispatcher forwarded
/// verbatim from the inbound request.
#[derive(Debug, Clone)]
pub struct RunnerRequest {
    pub mode: RunnerMode,
    pub user_message: Option<String>,
    pub payload: serde_json::Value,
}

/// What a runner hands back to the Dispatcher.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerOutput {
    pub content: String,
    pub payload: serde_json::Value,
}

impl RunnerOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            payload: serde_json::json!({}),
        }
    }
}

/// A registered runner type (§4.6). `execute` is the base dispatch: it
/// routes `request.mode` to the matching `handle_*` and needs no
/// overriding — runner types implement only the modes they support and
/// inherit `ErrUnsupportedMode` for the rest.
#[async_trait]
pub trait Runner: Send + Sync {
    fn runner_type(&self) -> RunnerType;

    async fn handle_converse(
        &self,
        _agent: &Agent,
        _request: &RunnerRequest,
        _capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        Err(RunnerError::UnsupportedMode("converse".to_string()))
    }

    async fn handle_plan(
        &self,
        _agent: &Agent,
        _request: &RunnerRequest,
        _capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        Err(RunnerError::UnsupportedMode("plan".to_string()))
    }

    async fn handle_build(
        &self,
        _agent: &Agent,
        _request: &RunnerRequest,
        _capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        Err(RunnerError::UnsupportedMode("build".to_string()))
    }

    async fn handle_hitl(
        &self,
        _agent: &Agent,
        _request: &RunnerRequest,
        _capsule: &IdentityCapsule,
        _cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        Err(RunnerError::UnsupportedMode("hitl".to_string()))
    }

    async fn execute(
        &self,
        agent: &Agent,
        request: &RunnerRequest,
        capsule: &IdentityCapsule,
        cancellation: &CancellationToken,
    ) -> Result<RunnerOutput, RunnerError> {
        match request.mode {
            RunnerMode::Converse => self.handle_converse(agent, request, capsule, cancellation).await,
            RunnerMode::Plan => self.handle_plan(agent, request, capsule, cancellation).await,
            RunnerMode::Build => self.handle_build(agent, request, capsule, cancellation).await,
            RunnerMode::Hitl => self.handle_hitl(agent, request, capsule, cancellation).await,
        }
    }
}
