//! Telemetry - observability infrastructure for the aegis-api process.
//!
//! Provides OpenTelemetry tracing and Prometheus metrics for the HTTP layer.
//! All features work standalone without external dependencies.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, AegisMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracer, shutdown_tracer, TelemetryConfig};
