//! `POST /agents/{org}/{agentSlug}/tasks` (§6): the single entry point to
//! the Dispatcher. Every mode (`converse/plan/build/hitl`) and every
//! Plan/Deliverable action (§4.2) crosses this one route via
//! `payload.action` — there is no separate Plan/Deliverable CRUD surface.

use axum::{extract::State, routing::post, Json, Router};
use aegis_core::{IdentityCapsule, RawCapsule, RunnerMode};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::middleware::auth::AuthContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TaskRequestBody {
    pub mode: RunnerMode,
    pub user_message: Option<String>,
    #[serde(default = "default_payload")]
    pub payload: serde_json::Value,
    pub context: RawCapsule,
}

fn default_payload() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TaskResponseBody {
    pub success: bool,
    pub payload: serde_json::Value,
    pub context: IdentityCapsule,
}

async fn create_task(
    State(state): State<AppState>,
    axum::extract::Path((org, agent_slug)): axum::extract::Path<(String, String)>,
    auth: AuthContext,
    Json(body): Json<TaskRequestBody>,
) -> ApiResult<Json<TaskResponseBody>> {
    let capsule = IdentityCapsule::accept(body.context, &auth.user_id)?;
    let request = aegis_runtime::TaskRequest {
        mode: body.mode,
        user_message: body.user_message,
        payload: body.payload,
    };
    let response = state.dispatcher.dispatch(&org, &agent_slug, request, capsule, &auth.user_id).await?;
    Ok(Json(TaskResponseBody {
        success: response.success,
        payload: response.payload,
        context: response.context,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/agents/:org/:agentSlug/tasks", post(create_task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_request_body_defaults_payload_to_empty_object() {
        let json = serde_json::json!({
            "mode": "converse",
            "context": {
                "orgSlug": "acme",
                "userId": "u1",
                "conversationId": "00000000-0000-0000-0000-000000000000",
                "agentSlug": "writer",
                "agentType": "context",
                "provider": "openai",
                "model": "gpt-5",
            }
        });
        let body: TaskRequestBody = serde_json::from_value(json).unwrap();
        assert_eq!(body.payload, serde_json::json!({}));
    }
}
