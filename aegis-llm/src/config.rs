//! LLM Gateway configuration: provider call timeout and retry policy,
//! loaded the way every other subsystem in this workspace loads its ambient
//! config (plain struct + `from_env`).

use crate::retry::RetryConfig;
use std::time::Duration;

/// Default provider call timeout (§5, §6): 120 seconds.
const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, Copy)]
pub struct LlmGatewayConfig {
    pub provider_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for LlmGatewayConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmGatewayConfig {
    /// Load `PROVIDER_TIMEOUT_MS` from the environment, falling back to the
    /// 120s default on absence or malformed input.
    pub fn from_env() -> Self {
        let provider_timeout = std::env::var("PROVIDER_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS));
        Self {
            provider_timeout,
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_provider_timeout_is_120_seconds() {
        let config = LlmGatewayConfig::default();
        assert_eq!(config.provider_timeout, Duration::from_secs(120));
    }
}
