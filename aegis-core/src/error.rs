//! Error taxonomy for the governed agent execution pipeline.
//!
//! Every subsystem raises its own `thiserror` enum; each maps to one of the
//! nine stable [`ErrorKind`]s from the error handling design so the
//! Dispatcher and the HTTP layer have a single, uniform surface regardless
//! of which subsystem raised the failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error kinds surfaced at the HTTP boundary. These are identifiers,
/// not type names — multiple subsystem error variants can map to the same
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    Unconfigured,
    UpstreamTimeout,
    UpstreamFailure,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// The HTTP status this kind is surfaced as.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unconfigured => 503,
            ErrorKind::UpstreamTimeout => 504,
            ErrorKind::UpstreamFailure => 502,
            ErrorKind::Cancelled => 499,
            ErrorKind::Internal => 500,
        }
    }

    /// Whether the dispatcher is allowed to retry a failure of this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Conflict | ErrorKind::UpstreamTimeout | ErrorKind::UpstreamFailure
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unconfigured => "Unconfigured",
            ErrorKind::UpstreamTimeout => "UpstreamTimeout",
            ErrorKind::UpstreamFailure => "UpstreamFailure",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(s)
    }
}

/// Implemented by every subsystem error enum so the Dispatcher can map
/// any failure to a stable [`ErrorKind`] without matching on concrete types.
pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}

/// Artifact Store (C2) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("version not found: {0}")]
    VersionNotFound(String),

    #[error("cannot delete the last remaining version of {0}")]
    CannotDeleteLast(String),

    #[error("quota exceeded for conversation {0}")]
    QuotaExceeded(String),

    #[error("optimistic concurrency conflict on {entity} {id} after {attempts} retries")]
    Conflict {
        entity: &'static str,
        id: String,
        attempts: u32,
    },

    #[error("storage lock poisoned")]
    LockPoisoned,
}

impl HasErrorKind for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::ConversationNotFound(_)
            | StorageError::NotFound { .. }
            | StorageError::VersionNotFound(_) => ErrorKind::NotFound,
            StorageError::CannotDeleteLast(_) | StorageError::QuotaExceeded(_) => {
                ErrorKind::BadRequest
            }
            StorageError::Conflict { .. } => ErrorKind::Conflict,
            StorageError::LockPoisoned => ErrorKind::Internal,
        }
    }
}

/// LLM Gateway (C4) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("no provider/model configured for this call and no org-scoped global config is set")]
    Unconfigured,

    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: i64 },

    #[error("provider {provider} failed with status {status}: {message}")]
    UpstreamFailure {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("call cancelled")]
    Cancelled,

    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl HasErrorKind for LlmError {
    fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Unconfigured => ErrorKind::Unconfigured,
            LlmError::Timeout { .. } => ErrorKind::UpstreamTimeout,
            LlmError::UpstreamFailure { .. } => ErrorKind::UpstreamFailure,
            LlmError::Cancelled => ErrorKind::Cancelled,
            LlmError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Runner Registry & Base Runner (C6) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// No runner is registered for the agent's runner type (§7: C6 is a
    /// named source for `NotFound`).
    #[error("unknown runner type: {0}")]
    UnknownRunnerType(String),

    #[error("runner does not support mode: {0}")]
    UnsupportedMode(String),

    /// The runner's downstream call (typically the LLM Gateway) has nothing
    /// configured to call — distinct from an upstream call that was
    /// attempted and failed.
    #[error("runner is unconfigured: {0}")]
    Unconfigured(String),

    /// A resource the runner depends on (e.g. an Artifact Store entity or
    /// version) doesn't exist. Distinct from `UnknownRunnerType`, which is
    /// about the runner lookup itself.
    #[error("not found: {0}")]
    NotFound(String),

    /// A downstream validation failure the runner surfaces as-is (e.g. the
    /// Artifact Store rejecting a delete/quota violation).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An underlying optimistic-concurrency write the runner depends on
    /// lost the race.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("runner timed out")]
    Timeout,

    #[error("runner upstream call failed: {0}")]
    UpstreamFailure(String),

    #[error("runner cancelled")]
    Cancelled,

    #[error("runner internal error: {0}")]
    Internal(String),
}

impl HasErrorKind for RunnerError {
    fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::UnknownRunnerType(_) => ErrorKind::NotFound,
            RunnerError::UnsupportedMode(_) => ErrorKind::BadRequest,
            RunnerError::Unconfigured(_) => ErrorKind::Unconfigured,
            RunnerError::NotFound(_) => ErrorKind::NotFound,
            RunnerError::BadRequest(_) => ErrorKind::BadRequest,
            RunnerError::Conflict(_) => ErrorKind::Conflict,
            RunnerError::Timeout => ErrorKind::UpstreamTimeout,
            RunnerError::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
            RunnerError::Cancelled => ErrorKind::Cancelled,
            RunnerError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// External Agent Client (C8) errors, carrying the JSON-RPC 2.0 code that produced them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum A2aError {
    #[error("invalid JSON-RPC request (-32600): {0}")]
    InvalidRequest(String),

    #[error("method not found (-32601): {0}")]
    MethodNotFound(String),

    #[error("invalid params (-32602): {0}")]
    InvalidParams(String),

    #[error("internal error (-32603): {0}")]
    Internal(String),

    #[error("server error ({code}): {message}")]
    ServerError { code: i64, message: String },

    #[error("transport error calling {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("discovery failed for {endpoint}: {reason}")]
    DiscoveryFailed { endpoint: String, reason: String },
}

impl HasErrorKind for A2aError {
    fn kind(&self) -> ErrorKind {
        match self {
            A2aError::InvalidRequest(_) | A2aError::InvalidParams(_) => ErrorKind::BadRequest,
            A2aError::MethodNotFound(_) => ErrorKind::NotFound,
            A2aError::Internal(_) => ErrorKind::Internal,
            // Server-defined codes (-32000...) and transport failures are treated as
            // retryable upstream failures per spec §4.8 / §7.
            A2aError::ServerError { .. } | A2aError::Transport { .. } => ErrorKind::UpstreamFailure,
            A2aError::DiscoveryFailed { .. } => ErrorKind::UpstreamFailure,
        }
    }
}

impl A2aError {
    /// Map a JSON-RPC 2.0 error code to the corresponding variant (spec §4.8).
    pub fn from_code(code: i64, message: String) -> Self {
        match code {
            -32600 => A2aError::InvalidRequest(message),
            -32601 => A2aError::MethodNotFound(message),
            -32602 => A2aError::InvalidParams(message),
            -32603 => A2aError::Internal(message),
            other => A2aError::ServerError { code: other, message },
        }
    }
}

/// Dispatcher (C7) errors — request validation and capsule enforcement.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: capsule userId does not match the authenticated subject")]
    Unauthorized,

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("dispatch timed out after {0}ms")]
    Timeout(u64),

    #[error("dispatch cancelled")]
    Cancelled,

    /// A runner (resolution or execution) failed; carries the runner
    /// error's own kind through rather than collapsing it to `BadRequest`
    /// (§7: "all other failures bubble to the Dispatcher, which maps them
    /// to the above kinds").
    #[error("runner failed: {message}")]
    RunnerFailed { kind: ErrorKind, message: String },
}

impl HasErrorKind for DispatchError {
    fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::BadRequest(_) => ErrorKind::BadRequest,
            DispatchError::Unauthorized => ErrorKind::Unauthorized,
            DispatchError::AgentNotFound(_) => ErrorKind::NotFound,
            DispatchError::Timeout(_) => ErrorKind::UpstreamTimeout,
            DispatchError::Cancelled => ErrorKind::Cancelled,
            DispatchError::RunnerFailed { kind, .. } => *kind,
        }
    }
}

impl From<RunnerError> for DispatchError {
    fn from(err: RunnerError) -> Self {
        DispatchError::RunnerFailed { kind: err.kind(), message: err.to_string() }
    }
}

/// Identity Capsule (C1) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapsuleError {
    #[error("missing required capsule field: {0}")]
    Missing(&'static str),

    #[error("capsule userId does not match the authenticated subject")]
    AuthMismatch,

    #[error("{field} is already assigned and cannot be reassigned")]
    Immutable { field: &'static str },
}

impl HasErrorKind for CapsuleError {
    fn kind(&self) -> ErrorKind {
        match self {
            CapsuleError::Missing(_) => ErrorKind::BadRequest,
            CapsuleError::AuthMismatch => ErrorKind::Unauthorized,
            CapsuleError::Immutable { .. } => ErrorKind::BadRequest,
        }
    }
}

/// Master error type aggregating every subsystem error.
#[derive(Debug, Clone, Error)]
pub enum AegisError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("a2a error: {0}")]
    A2a(#[from] A2aError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("capsule error: {0}")]
    Capsule(#[from] CapsuleError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HasErrorKind for AegisError {
    fn kind(&self) -> ErrorKind {
        match self {
            AegisError::Storage(e) => e.kind(),
            AegisError::Llm(e) => e.kind(),
            AegisError::Runner(e) => e.kind(),
            AegisError::A2a(e) => e.kind(),
            AegisError::Dispatch(e) => e.kind(),
            AegisError::Capsule(e) => e.kind(),
            AegisError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Result type alias for aegis operations.
pub type AegisResult<T> = Result<T, AegisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_http_status_matches_spec_table() {
        assert_eq!(ErrorKind::BadRequest.http_status(), 400);
        assert_eq!(ErrorKind::Unauthorized.http_status(), 401);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
        assert_eq!(ErrorKind::Unconfigured.http_status(), 503);
        assert_eq!(ErrorKind::UpstreamTimeout.http_status(), 504);
        assert_eq!(ErrorKind::UpstreamFailure.http_status(), 502);
        assert_eq!(ErrorKind::Cancelled.http_status(), 499);
        assert_eq!(ErrorKind::Internal.http_status(), 500);
    }

    #[test]
    fn retryable_kinds_match_spec_table() {
        assert!(ErrorKind::Conflict.is_retryable());
        assert!(ErrorKind::UpstreamTimeout.is_retryable());
        assert!(ErrorKind::UpstreamFailure.is_retryable());
        assert!(!ErrorKind::BadRequest.is_retryable());
        assert!(!ErrorKind::Unauthorized.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::Unconfigured.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }

    #[test]
    fn subsystem_errors_map_to_expected_kinds() {
        assert_eq!(
            StorageError::Conflict {
                entity: "plan",
                id: "p1".into(),
                attempts: 3
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(LlmError::Unconfigured.kind(), ErrorKind::Unconfigured);
        assert_eq!(
            LlmError::Timeout {
                provider: "openai".into(),
                timeout_ms: 120_000
            }
            .kind(),
            ErrorKind::UpstreamTimeout
        );
        assert_eq!(CapsuleError::AuthMismatch.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn a2a_error_from_code_matches_jsonrpc_standard_codes() {
        assert!(matches!(
            A2aError::from_code(-32600, "bad".into()),
            A2aError::InvalidRequest(_)
        ));
        assert!(matches!(
            A2aError::from_code(-32601, "bad".into()),
            A2aError::MethodNotFound(_)
        ));
        assert!(matches!(
            A2aError::from_code(-32602, "bad".into()),
            A2aError::InvalidParams(_)
        ));
        assert!(matches!(
            A2aError::from_code(-32603, "bad".into()),
            A2aError::Internal(_)
        ));
        assert_eq!(
            A2aError::from_code(-32000, "server defined".into()).kind(),
            ErrorKind::UpstreamFailure
        );
    }

    #[test]
    fn aegis_error_kind_delegates_to_source() {
        let err: AegisError = StorageError::VersionNotFound("v1".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn runner_error_kinds_match_spec_table() {
        assert_eq!(RunnerError::UnknownRunnerType("media".into()).kind(), ErrorKind::NotFound);
        assert_eq!(RunnerError::Unconfigured("no provider".into()).kind(), ErrorKind::Unconfigured);
        assert_eq!(RunnerError::NotFound("deliverable v2".into()).kind(), ErrorKind::NotFound);
        assert_eq!(RunnerError::Conflict("deliverable d1".into()).kind(), ErrorKind::Conflict);
    }

    #[test]
    fn dispatch_error_from_runner_error_preserves_kind() {
        let dispatch_err: DispatchError = RunnerError::Unconfigured("no provider".into()).into();
        assert_eq!(dispatch_err.kind(), ErrorKind::Unconfigured);

        let dispatch_err: DispatchError = RunnerError::UnknownRunnerType("media".into()).into();
        assert_eq!(dispatch_err.kind(), ErrorKind::NotFound);

        let dispatch_err: DispatchError = RunnerError::UpstreamFailure("boom".into()).into();
        assert_eq!(dispatch_err.kind(), ErrorKind::UpstreamFailure);
    }
}
