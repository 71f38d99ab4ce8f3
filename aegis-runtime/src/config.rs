//! Dispatcher configuration: the `T_dispatch` timeout bounding step 6 of the
//! eight-step contract, loaded the way every other subsystem in this
//! workspace loads its ambient config (plain struct + `from_env`).

use std::time::Duration;

/// Default dispatch timeout (§4.7, §5): 600 seconds.
const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub dispatch_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { dispatch_timeout: Duration::from_millis(DEFAULT_DISPATCH_TIMEOUT_MS) }
    }
}

impl DispatcherConfig {
    /// Load `DISPATCH_TIMEOUT_MS` from the environment, falling back to the
    /// 600s default on absence or malformed input.
    pub fn from_env() -> Self {
        let dispatch_timeout = std::env::var("DISPATCH_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_DISPATCH_TIMEOUT_MS));
        Self { dispatch_timeout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dispatch_timeout_is_600_seconds() {
        let config = DispatcherConfig::default();
        assert_eq!(config.dispatch_timeout, Duration::from_secs(600));
    }
}
