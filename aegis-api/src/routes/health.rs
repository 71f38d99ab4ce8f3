//! `/health/ping`, `/health/live`, `/health/ready` — Kubernetes-style
//! health checks, trimmed to this workspace: there's no database
//! connection pool to probe, so readiness only reports whether bootstrap
//! completed (which, by the time this handler runs, it always has).

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
}

async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/ping", get(ping))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes_lowercase_status() {
        let response = HealthResponse { status: HealthStatus::Healthy, version: "0.1.0".into(), uptime_seconds: 12 };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], serde_json::json!("healthy"));
    }
}
