//! Bearer-token authentication and §10.6's ambient rate limiting.
//!
//! The Dispatcher's own rules (capsule `userId` must equal the
//! authenticated subject, §4.1/§4.7 step 2) are enforced downstream in
//! route handlers; this middleware only establishes *who* the caller is
//! and rejects requests before that subject is known at all.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl AuthConfig {
    /// `AEGIS_JWT_SECRET`; falls back to a fixed dev secret with a warning,
    /// matching §10.3's "construction never panics" rule.
    pub fn from_env() -> Self {
        let jwt_secret = std::env::var("AEGIS_JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("AEGIS_JWT_SECRET unset; using an insecure development default");
            "dev-insecure-secret".to_string()
        });
        Self { jwt_secret }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// The authenticated caller's subject (§4.1: must equal `capsule.userId`).
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

fn authenticate_bearer(authorization: &str, config: &AuthConfig) -> Result<AuthContext, ApiError> {
    let token = authorization
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::new(aegis_core::ErrorKind::Unauthorized, "missing bearer token"))?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| ApiError::new(aegis_core::ErrorKind::Unauthorized, format!("invalid bearer token: {err}")))?;

    Ok(AuthContext { user_id: data.claims.sub })
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::new(aegis_core::ErrorKind::Unauthorized, "missing Authorization header"))?;
        authenticate_bearer(header, &state.config.auth)
    }
}

/// Axum middleware: authenticates the request and stashes [`AuthContext`]
/// in extensions for downstream extractors and for the rate limiter.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match header {
        Some(header) => match authenticate_bearer(&header, &state.config.auth) {
            Ok(ctx) => {
                request.extensions_mut().insert(ctx);
                next.run(request).await
            }
            Err(err) => err.into_response(),
        },
        None => ApiError::new(aegis_core::ErrorKind::Unauthorized, "missing Authorization header").into_response(),
    }
}

/// Per-key token bucket limiter, keyed by authenticated user id when
/// present, by client IP otherwise (§10.6).
pub struct RateLimitState {
    limiters: DashMap<String, Arc<RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>>,
    config: Arc<ApiConfig>,
}

impl RateLimitState {
    pub fn new(config: Arc<ApiConfig>) -> Self {
        Self { limiters: DashMap::new(), config }
    }

    fn limiter_for(&self, key: &str, per_minute: u32) -> Arc<RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>> {
        self.limiters
            .entry(key.to_string())
            .or_insert_with(|| {
                let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).unwrap())
                    .allow_burst(NonZeroU32::new(self.config.rate_limit_burst.max(1)).unwrap());
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.rate_limit_enabled {
        return next.run(request).await;
    }

    let auth_context = request.extensions().get::<AuthContext>().cloned();
    let (key, per_minute) = match &auth_context {
        Some(ctx) => (format!("user:{}", ctx.user_id), state.config.rate_limit_authenticated_per_min),
        None => (format!("ip:{}", addr.ip()), state.config.rate_limit_unauthenticated_per_min),
    };

    let limiter = state.rate_limiter.limiter_for(&key, per_minute);
    match limiter.check() {
        Ok(()) => next.run(request).await,
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "1")],
            "rate limit exceeded",
        )
            .into_response(),
    }
}
