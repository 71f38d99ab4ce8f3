//! Prometheus Metrics Definitions
//!
//! Defines the aegis-api metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Dispatch latency buckets (seconds) - dispatches are allowed up to DISPATCH_TIMEOUT_MS (600s)
const DISPATCH_LATENCY_BUCKETS: &[f64] =
    &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Global metrics instance - initialized once at startup.
pub static METRICS: Lazy<ApiResult<AegisMetrics>> = Lazy::new(AegisMetrics::new);

/// Container for all aegis-api metrics.
#[derive(Clone)]
pub struct AegisMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Dispatch counter - labels: mode, runner_type, outcome
    pub dispatch_total: CounterVec,

    /// Dispatch duration histogram - labels: mode, runner_type
    pub dispatch_duration_seconds: HistogramVec,

    /// LLM gateway call counter - labels: provider, model, outcome
    pub llm_calls_total: CounterVec,

    /// LLM gateway token counter - labels: provider, model, kind (prompt/completion)
    pub llm_tokens_total: CounterVec,

    /// Current number of live observability-stream subscribers
    pub observability_subscribers: Gauge,

    /// Observability bus dropped-event counter (ring-buffer overflow + slow subscriber evictions)
    pub observability_drops_total: CounterVec,

    /// Artifact store action counter - labels: kind (plan/deliverable), action, status
    pub artifact_actions_total: CounterVec,
}

impl AegisMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "aegis_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "aegis_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register http_request_duration_seconds: {}", e)))?,

            dispatch_total: register_counter_vec!(
                "aegis_dispatch_total",
                "Total number of dispatcher invocations",
                &["mode", "runner_type", "outcome"]
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register dispatch_total: {}", e)))?,

            dispatch_duration_seconds: register_histogram_vec!(
                "aegis_dispatch_duration_seconds",
                "Dispatch duration in seconds",
                &["mode", "runner_type"],
                DISPATCH_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register dispatch_duration_seconds: {}", e)))?,

            llm_calls_total: register_counter_vec!(
                "aegis_llm_calls_total",
                "Total number of LLM gateway calls",
                &["provider", "model", "outcome"]
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register llm_calls_total: {}", e)))?,

            llm_tokens_total: register_counter_vec!(
                "aegis_llm_tokens_total",
                "Total LLM tokens accounted",
                &["provider", "model", "kind"]
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register llm_tokens_total: {}", e)))?,

            observability_subscribers: register_gauge!(
                "aegis_observability_subscribers",
                "Current number of live observability-stream subscribers"
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register observability_subscribers: {}", e)))?,

            observability_drops_total: register_counter_vec!(
                "aegis_observability_drops_total",
                "Total observability events dropped",
                &["reason"]
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register observability_drops_total: {}", e)))?,

            artifact_actions_total: register_counter_vec!(
                "aegis_artifact_actions_total",
                "Total artifact store actions",
                &["kind", "action", "status"]
            )
            .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("Failed to register artifact_actions_total: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a dispatcher invocation.
    pub fn record_dispatch(&self, mode: &str, runner_type: &str, outcome: &str, duration_secs: f64) {
        self.dispatch_total
            .with_label_values(&[mode, runner_type, outcome])
            .inc();
        self.dispatch_duration_seconds
            .with_label_values(&[mode, runner_type])
            .observe(duration_secs);
    }

    /// Record an LLM gateway call.
    pub fn record_llm_call(&self, provider: &str, model: &str, outcome: &str) {
        self.llm_calls_total
            .with_label_values(&[provider, model, outcome])
            .inc();
    }

    /// Record LLM token usage.
    pub fn record_llm_tokens(&self, provider: &str, model: &str, kind: &str, count: u64) {
        self.llm_tokens_total
            .with_label_values(&[provider, model, kind])
            .inc_by(count as f64);
    }

    /// Increment the live observability-subscriber gauge.
    pub fn observability_subscriber_connected(&self) {
        self.observability_subscribers.inc();
    }

    /// Decrement the live observability-subscriber gauge.
    pub fn observability_subscriber_disconnected(&self) {
        self.observability_subscribers.dec();
    }

    /// Record a dropped observability event.
    pub fn record_observability_drop(&self, reason: &str) {
        self.observability_drops_total.with_label_values(&[reason]).inc();
    }

    /// Record an artifact store action.
    pub fn record_artifact_action(&self, kind: &str, action: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.artifact_actions_total
            .with_label_values(&[kind, action, status])
            .inc();
    }
}

impl Default for AegisMetrics {
    fn default() -> Self {
        Self::new().expect("failed to register default metrics")
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_http_request("POST", "/agents/acme/writer/tasks", 200, 0.015);
        Ok(())
    }

    #[test]
    fn test_record_dispatch() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_dispatch("build", "context", "succeeded", 1.2);
        metrics.record_dispatch("converse", "external", "failed", 0.3);
        Ok(())
    }

    #[test]
    fn test_record_llm_call_and_tokens() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_llm_call("openai", "gpt-4o", "ok");
        metrics.record_llm_tokens("openai", "gpt-4o", "prompt", 128);
        metrics.record_llm_tokens("openai", "gpt-4o", "completion", 64);
        Ok(())
    }

    #[test]
    fn test_observability_gauges() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.observability_subscriber_connected();
        metrics.observability_subscriber_connected();
        metrics.observability_subscriber_disconnected();
        metrics.record_observability_drop("ring_buffer_overflow");
        metrics.record_observability_drop("slow_subscriber");
        Ok(())
    }

    #[test]
    fn test_artifact_action_metrics() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_artifact_action("plan", "create", true);
        metrics.record_artifact_action("deliverable", "merge_versions", false);
        Ok(())
    }
}
