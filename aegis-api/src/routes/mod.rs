//! HTTP route table (§6). Each module owns one concern's handlers and its
//! own request/response DTOs; this just merges their routers.

mod health;
mod llm;
mod observability;
mod tasks;
mod webhooks;

use axum::{routing::get, Router};

use crate::middleware::{auth_middleware, rate_limit_middleware};
use crate::state::AppState;
use crate::telemetry::metrics_handler;

/// Merges every concern's routes into one table. `auth_middleware` and
/// `rate_limit_middleware` are applied with `route_layer` rather than in
/// `main.rs`'s outer `layer` stack so that `/webhooks/status` can be
/// excluded from the former: external runners don't carry a bearer
/// subject of their own, only the capsule passed through A2A (§4.8), so
/// the webhook is trusted at the network boundary instead. It still goes
/// through rate limiting, keyed by client IP since it never gets an
/// `AuthContext`.
///
/// `/health/*` and `/metrics` skip both layers entirely — orchestrator
/// probes and the Prometheus scraper are infrastructure, not tenants, and
/// shouldn't compete with real traffic for a rate-limit bucket.
pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .merge(tasks::router())
        .merge(llm::router())
        .merge(observability::router())
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public = webhooks::router()
        .route_layer(axum::middleware::from_fn_with_state(state, rate_limit_middleware));

    let unrestricted = health::router().route("/metrics", get(metrics_handler));

    protected.merge(public).merge(unrestricted)
}
