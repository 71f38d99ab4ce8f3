//! `POST /webhooks/status` (§6): inbound progress reports from external
//! (`external`/A2A) runners, fed straight onto the Observability Bus and
//! used to advance the originating task's status.

use axum::{extract::State, routing::post, Json, Router};
use aegis_core::{EntityIdType, IdentityCapsule, TaskId, TaskStatus};
use serde::Deserialize;
use std::str::FromStr;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatusBody {
    pub task_id: String,
    pub status: String,
    pub context: IdentityCapsule,
    pub message: Option<String>,
    pub progress: Option<u8>,
    pub step: Option<String>,
    pub execution_id: Option<String>,
    pub workflow_id: Option<String>,
    pub workflow_name: Option<String>,
}

fn task_status(raw: &str) -> Option<TaskStatus> {
    match raw {
        "pending" => Some(TaskStatus::Pending),
        "running" => Some(TaskStatus::Running),
        "succeeded" => Some(TaskStatus::Succeeded),
        "failed" => Some(TaskStatus::Failed),
        "cancelled" => Some(TaskStatus::Cancelled),
        _ => None,
    }
}

/// External runners don't carry an authenticated bearer subject of their
/// own (§4.8: the capsule passes through A2A, not a fresh login); the
/// webhook is trusted at the network boundary rather than via this
/// process's own JWT auth.
async fn webhook_status(State(state): State<AppState>, Json(body): Json<WebhookStatusBody>) -> ApiResult<Json<serde_json::Value>> {
    if let Ok(task_id) = TaskId::from_str(&body.task_id) {
        if let Some(status) = task_status(&body.status) {
            let _ = state.tasks.set_status(task_id, status).await;
        }
    }

    state
        .bus
        .push(aegis_core::ObservabilityEvent {
            id: aegis_core::ObservabilityEventId::now_v7(),
            capsule: body.context,
            source_app: "external-runner".to_string(),
            event_type: "task.progress".to_string(),
            status: body.status,
            message: body.message,
            progress: body.progress,
            step: body.step,
            payload: serde_json::json!({
                "taskId": body.task_id,
                "executionId": body.execution_id,
                "workflowId": body.workflow_id,
                "workflowName": body.workflow_name,
            }),
            user_display_name: None,
            timestamp: chrono::Utc::now(),
        })
        .await;

    Ok(Json(serde_json::json!({"accepted": true})))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks/status", post(webhook_status))
}
