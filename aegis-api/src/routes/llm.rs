//! `POST /llm/generate` and `POST /llm/usage` (§6): direct access to the
//! LLM Gateway for callers that make their own specialized model calls
//! outside the Dispatcher's mode/runner machinery.

use axum::{extract::State, routing::post, Json, Router};
use aegis_core::{CallerType, IdentityCapsule, RawCapsule, UsageRecord, UsageRecordId, UsageRecordStatus, EntityIdType};
use aegis_llm::{GenerateOptions, GenerateRequest};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ApiResult;
use crate::middleware::auth::AuthContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequestBody {
    pub system_prompt: String,
    pub user_prompt: String,
    pub context: RawCapsule,
    #[serde(default)]
    pub options: GenerateOptions,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponseBody {
    pub content: String,
}

fn option_str(options: &GenerateOptions, key: &str) -> Option<String> {
    options.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

async fn generate(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<GenerateRequestBody>,
) -> ApiResult<Json<GenerateResponseBody>> {
    let capsule = IdentityCapsule::accept(body.context, &auth.user_id)?;
    let provider = option_str(&body.options, "provider").unwrap_or_else(|| capsule.provider.clone());
    let model = option_str(&body.options, "model").unwrap_or_else(|| capsule.model.clone());
    let caller_name = option_str(&body.options, "callerName").unwrap_or_else(|| "llm.generate".to_string());

    let content = state
        .llm
        .generate(
            GenerateRequest {
                capsule: &capsule,
                provider,
                model,
                system_prompt: body.system_prompt,
                user_prompt: body.user_prompt,
                options: body.options,
                dictionary: None,
                caller_type: CallerType::External,
                caller_name,
            },
            &CancellationToken::new(),
        )
        .await?;

    Ok(Json(GenerateResponseBody { content }))
}

/// Body matches [`UsageRecord`] without `id`/`timestamp`, both of which are
/// assigned server-side (§6).
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UsageReportBody {
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
    #[serde(default = "UsageReportBody::default_status")]
    pub status: UsageRecordStatus,
}

impl UsageReportBody {
    fn default_status() -> UsageRecordStatus {
        UsageRecordStatus::Completed
    }
}

async fn report_usage(State(state): State<AppState>, _auth: AuthContext, Json(body): Json<UsageReportBody>) -> ApiResult<Json<serde_json::Value>> {
    state
        .llm
        .record_usage(UsageRecord {
            id: UsageRecordId::now_v7(),
            capsule: body.capsule,
            provider: body.provider,
            model: body.model,
            caller_type: body.caller_type,
            caller_name: body.caller_name,
            prompt_tokens: body.prompt_tokens,
            completion_tokens: body.completion_tokens,
            cached_input_tokens: body.cached_input_tokens,
            thinking_tokens: body.thinking_tokens,
            cost_cents: body.cost_cents,
            latency_ms: body.latency_ms,
            status: body.status,
            timestamp: chrono::Utc::now(),
        })
        .await;
    Ok(Json(serde_json::json!({"accepted": true})))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/llm/generate", post(generate))
        .route("/llm/usage", post(report_usage))
}
