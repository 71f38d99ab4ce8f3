//! HTTP-layer configuration: bind address, CORS, and rate limiting. The
//! subsystem configs (Observability, Dispatcher, LLM Gateway, PII) own
//! their own `from_env()` per §10.3; this one covers what's specific to
//! the edge.

use std::time::Duration;

use crate::middleware::auth::AuthConfig;

/// API configuration for bind address, CORS, and rate limiting.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_host: String,
    pub bind_port: u16,

    /// Allowed CORS origins. Empty means allow all (dev mode).
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,
    pub cors_max_age_secs: u64,

    /// §10.6: ambient rate limiting ahead of the Dispatcher, keyed by
    /// `(orgSlug, userId)` once authenticated, by client IP otherwise.
    pub rate_limit_enabled: bool,
    pub rate_limit_authenticated_per_min: u32,
    pub rate_limit_unauthenticated_per_min: u32,
    pub rate_limit_burst: u32,
    pub rate_limit_window: Duration,

    pub auth: AuthConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 3000,
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86_400,
            rate_limit_enabled: true,
            rate_limit_authenticated_per_min: 1000,
            rate_limit_unauthenticated_per_min: 100,
            rate_limit_burst: 10,
            rate_limit_window: Duration::from_secs(60),
            auth: AuthConfig { jwt_secret: "dev-insecure-secret".to_string() },
        }
    }
}

impl ApiConfig {
    /// Environment variables:
    /// - `AEGIS_API_BIND` / `PORT` (or `AEGIS_API_PORT`)
    /// - `AEGIS_CORS_ORIGINS` (comma-separated, empty = allow all)
    /// - `AEGIS_CORS_ALLOW_CREDENTIALS` ("true"/"false")
    /// - `AEGIS_CORS_MAX_AGE_SECS`
    /// - `AEGIS_RATE_LIMIT_ENABLED` ("true"/"false")
    /// - `AEGIS_RATE_LIMIT_AUTHENTICATED` (requests/min per tenant)
    /// - `AEGIS_RATE_LIMIT_UNAUTHENTICATED` (requests/min per IP)
    /// - `AEGIS_RATE_LIMIT_BURST`
    pub fn from_env() -> Self {
        let default = Self::default();

        let bind_host = std::env::var("AEGIS_API_BIND").unwrap_or(default.bind_host);
        let bind_port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("AEGIS_API_PORT").ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.bind_port);

        let cors_origins = std::env::var("AEGIS_CORS_ORIGINS")
            .ok()
            .map(|s| s.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
            .unwrap_or_default();

        let cors_allow_credentials = std::env::var("AEGIS_CORS_ALLOW_CREDENTIALS")
            .ok()
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(default.cors_allow_credentials);

        let cors_max_age_secs = std::env::var("AEGIS_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.cors_max_age_secs);

        let rate_limit_enabled = std::env::var("AEGIS_RATE_LIMIT_ENABLED")
            .ok()
            .map(|s| !s.eq_ignore_ascii_case("false"))
            .unwrap_or(default.rate_limit_enabled);

        let rate_limit_authenticated_per_min = std::env::var("AEGIS_RATE_LIMIT_AUTHENTICATED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.rate_limit_authenticated_per_min);

        let rate_limit_unauthenticated_per_min = std::env::var("AEGIS_RATE_LIMIT_UNAUTHENTICATED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.rate_limit_unauthenticated_per_min);

        let rate_limit_burst = std::env::var("AEGIS_RATE_LIMIT_BURST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default.rate_limit_burst);

        Self {
            bind_host,
            bind_port,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            rate_limit_enabled,
            rate_limit_authenticated_per_min,
            rate_limit_unauthenticated_per_min,
            rate_limit_burst,
            auth: AuthConfig::from_env(),
            rate_limit_window: Duration::from_secs(60),
        }
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }
        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(pattern);
                }
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_all_origins_in_dev() {
        let config = ApiConfig::default();
        assert!(config.is_origin_allowed("https://anything.example"));
    }

    #[test]
    fn production_config_restricts_to_listed_origins() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec!["https://aegis.run".to_string()];
        assert!(config.is_origin_allowed("https://aegis.run"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }

    #[test]
    fn wildcard_subdomain_origin_is_allowed() {
        let mut config = ApiConfig::default();
        config.cors_origins = vec!["*.aegis.run".to_string()];
        assert!(config.is_origin_allowed("https://app.aegis.run"));
        assert!(!config.is_origin_allowed("https://evil.example"));
    }
}
