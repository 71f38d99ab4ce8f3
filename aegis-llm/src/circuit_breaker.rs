//! Per-provider circuit breaker (§4.4, §5): gates provider selection before
//! the retry loop runs, so a provider already known to be down fails fast
//! instead of burning retry attempts.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `Closed` before tripping to `Open`.
    pub failure_threshold: u32,
    /// Consecutive successes in `HalfOpen` before resetting to `Closed`.
    pub success_threshold: u32,
    /// How long `Open` holds before allowing a single `HalfOpen` probe.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Atomic state machine gating a single provider. `is_allowed` is checked
/// before step 3 of the generate pipeline; a rejected call fails fast with
/// `LlmError::UpstreamFailure` without consuming a retry attempt.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at: RwLock::new(None),
        }
    }

    fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: CircuitState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Whether a call may proceed right now. `Open` transitions itself to
    /// `HalfOpen` once `open_timeout` has elapsed, admitting exactly the
    /// caller that observes the transition.
    pub fn is_allowed(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .read()
                    .unwrap()
                    .map(|at| at.elapsed() >= self.config.open_timeout)
                    .unwrap_or(true);
                if elapsed {
                    self.set_state(CircuitState::HalfOpen);
                    self.success_count.store(0, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    self.set_state(CircuitState::Closed);
                    self.failure_count.store(0, Ordering::SeqCst);
                    self.success_count.store(0, Ordering::SeqCst);
                    *self.opened_at.write().unwrap() = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.trip();
                }
            }
            CircuitState::HalfOpen => {
                self.trip();
            }
            CircuitState::Open => {}
        }
    }

    fn trip(&self) {
        self.set_state(CircuitState::Open);
        self.success_count.store(0, Ordering::SeqCst);
        *self.opened_at.write().unwrap() = Some(Instant::now());
    }

    pub fn reset(&self) {
        self.set_state(CircuitState::Closed);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        *self.opened_at.write().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            open_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn trips_open_after_failure_threshold() {
        let breaker = CircuitBreaker::new(fast_config());
        assert!(breaker.is_allowed());
        breaker.record_failure();
        assert!(breaker.is_allowed());
        breaker.record_failure();
        assert!(!breaker.is_allowed());
    }

    #[test]
    fn half_open_probe_allowed_after_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new(fast_config());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_allowed());
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.is_allowed());
        breaker.record_success();
        assert!(breaker.is_allowed());
        // Closed again: failures reset, a single failure shouldn't retrip.
        breaker.record_failure();
        assert!(breaker.is_allowed());
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new(fast_config());
        breaker.record_failure();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.is_allowed());
        breaker.record_failure();
        assert!(!breaker.is_allowed());
    }
}
