//! Retry/backoff helper (§4.4): `base=500ms, factor=2, jitter=±20%,
//! max_tries=3`, retrying only on retryable failures (429/5xx-class
//! timeouts and upstream failures, per the `ErrorKind` retryability table).

use crate::LlmError;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub base: Duration,
    pub factor: u32,
    pub jitter: f64,
    pub max_tries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2,
            jitter: 0.2,
            max_tries: 3,
        }
    }
}

/// Is this failure worth another attempt? Only timeouts and upstream
/// failures are retryable; anything else (e.g. a malformed request) would
/// just fail the same way again.
fn is_retryable(err: &LlmError) -> bool {
    matches!(err, LlmError::Timeout { .. } | LlmError::UpstreamFailure { .. })
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = config.factor.saturating_pow(attempt.saturating_sub(1));
    let nominal = config.base.as_millis() as f64 * exponent as f64;
    let jitter_span = nominal * config.jitter;
    let offset = rand::rng().random_range(-jitter_span..=jitter_span);
    let millis = (nominal + offset).max(0.0) as u64;
    Duration::from_millis(millis)
}

/// Run `attempt` up to `config.max_tries` times, sleeping a jittered
/// exponential backoff between retryable failures. The first attempt counts
/// toward `max_tries`; a rejected circuit breaker call never reaches here
/// (the gateway checks `is_allowed` before calling this).
pub async fn retry_with_backoff<F, Fut, T>(config: RetryConfig, mut attempt: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    let mut last_err = None;
    for try_number in 1..=config.max_tries {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = is_retryable(&err);
                last_err = Some(err);
                if !retryable || try_number == config.max_tries {
                    break;
                }
                tokio::time::sleep(backoff_delay(&config, try_number)).await;
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}
