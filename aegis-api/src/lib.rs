//! aegis-api - HTTP surface for the governed agent execution pipeline.
//!
//! Exposes the Dispatcher's single task route, an LLM Gateway passthrough
//! for callers that don't go through a runner, the Observability Bus's
//! live stream and history, and the webhook inbox external runners report
//! progress to.

pub mod agent_directory;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod sinks;
pub mod state;
pub mod telemetry;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use middleware::{auth_middleware, rate_limit_middleware, AuthConfig, AuthContext, RateLimitState};
pub use routes::router;
pub use state::AppState;
pub use telemetry::{init_tracer, metrics_handler, shutdown_tracer, AegisMetrics, TelemetryConfig, METRICS};
