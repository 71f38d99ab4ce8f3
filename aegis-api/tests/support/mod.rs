//! Shared scaffolding for `aegis-api`'s route-level tests: a bootstrapped
//! [`AppState`], a bearer token signed with its dev JWT secret, and a thin
//! request builder over `tower::ServiceExt::oneshot`.

use std::net::SocketAddr;

use aegis_api::{router, ApiConfig, AppState};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// Signs a bearer token for `user_id` against `config`'s dev JWT secret.
pub fn bearer_token(config: &ApiConfig, user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
    )
    .expect("signing a test token never fails")
}

/// An `ApiConfig` with rate limiting disabled, so route tests aren't at the
/// mercy of shared token-bucket state between runs.
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.rate_limit_enabled = false;
    config
}

pub async fn test_app(config: ApiConfig) -> (Router, ApiConfig) {
    let state = AppState::bootstrap(config.clone()).await;
    let app = router(state.clone()).with_state(state);
    (app, config)
}

/// `rate_limit_middleware` always extracts `ConnectInfo<SocketAddr>`, even
/// when rate limiting is disabled; `oneshot`-driven tests skip the
/// `into_make_service_with_connect_info` wrapper `main.rs` uses, so this
/// stands in for the peer address it would have supplied.
fn peer_addr() -> SocketAddr {
    "127.0.0.1:9999".parse().unwrap()
}

pub async fn send(app: Router, mut req: Request<Body>) -> (StatusCode, Value) {
    req.extensions_mut().insert(ConnectInfo(peer_addr()));
    let response = app.oneshot(req).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, body)
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(token) = auth {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
