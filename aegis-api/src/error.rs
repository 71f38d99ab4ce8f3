//! HTTP-facing error shape (§7, §10.2): every subsystem error converts to
//! one of the nine stable [`ErrorKind`]s before it reaches the wire.

use aegis_core::{ErrorKind, HasErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `{kind, message, details}` — the only shape an error ever takes on the
/// wire, regardless of which subsystem raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// §7's kind -> status mapping, delegating to [`ErrorKind::http_status`]
    /// so the table is defined exactly once.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind.http_status()).expect("ErrorKind::http_status is always a valid HTTP status")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

/// Any subsystem error that carries an [`ErrorKind`] converts uniformly;
/// no ad hoc domain-specific variant leaks to the wire (§10.2).
impl<E: HasErrorKind + fmt::Display> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError::new(err.kind(), err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
