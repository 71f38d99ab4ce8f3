//! Axum middleware: bearer-token authentication and §10.6's ambient rate
//! limiting, applied in that order (rate limiting keys off the
//! authenticated subject when one is present).

pub mod auth;

pub use auth::{auth_middleware, rate_limit_middleware, AuthConfig, AuthContext, RateLimitState};
