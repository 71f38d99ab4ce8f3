//! aegis-api server entry point: wires every subsystem crate into one
//! process via [`AppState::bootstrap`] and serves the Dispatcher/LLM
//! Gateway/Observability Bus/webhook routes over HTTP.

use std::net::SocketAddr;

use aegis_api::telemetry::{init_tracer, observability_middleware, shutdown_tracer, TelemetryConfig};
use aegis_api::{router, ApiConfig, ApiError, ApiResult, AppState};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let config = ApiConfig::from_env();
    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.bind_port)
        .parse()
        .map_err(|e| ApiError::new(aegis_core::ErrorKind::BadRequest, format!("invalid bind address: {e}")))?;

    let state = AppState::bootstrap(config).await;
    let cors = build_cors_layer(&state.config);

    let app = router(state.clone())
        .layer(axum::middleware::from_fn(observability_middleware))
        .layer(cors)
        .with_state(state);

    tracing::info!(%addr, "Starting aegis-api server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("failed to bind {addr}: {e}")))?;

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::new(aegis_core::ErrorKind::Internal, format!("server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    shutdown_tracer();
    Ok(())
}

/// Empty `cors_origins` means allow-all (dev mode); otherwise only the
/// configured origins (including `*.` wildcard suffixes) are reflected.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        .max_age(std::time::Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        return layer.allow_origin(AllowOrigin::any());
    }

    let config = config.clone();
    layer
        .allow_credentials(config.cors_allow_credentials)
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin.to_str().map(|o| config.is_origin_allowed(o)).unwrap_or(false)
        }))
}
