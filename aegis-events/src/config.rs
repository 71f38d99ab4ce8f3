//! Observability Bus configuration (§4.5, §6): ring buffer capacity `B`,
//! per-subscriber queue depth `K`, enrichment cache size `U` and TTL.

use std::time::Duration;

const DEFAULT_BUFFER_CAPACITY: usize = 500;
const DEFAULT_SUBSCRIBER_QUEUE: usize = 128;
const DEFAULT_ENRICHMENT_CACHE_SIZE: usize = 10_000;
const DEFAULT_ENRICHMENT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy)]
pub struct ObservabilityBusConfig {
    /// `B`: ring buffer capacity; oldest event dropped on overflow.
    pub buffer_capacity: usize,
    /// `K`: per-subscriber queued-event limit before it is dropped as lagged.
    pub subscriber_queue: usize,
    /// `U`: enrichment cache entry count.
    pub enrichment_cache_size: usize,
    /// TTL for a cached `userId -> displayName` entry.
    pub enrichment_ttl: Duration,
}

impl Default for ObservabilityBusConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
            enrichment_cache_size: DEFAULT_ENRICHMENT_CACHE_SIZE,
            enrichment_ttl: DEFAULT_ENRICHMENT_TTL,
        }
    }
}

impl ObservabilityBusConfig {
    pub fn from_env() -> Self {
        let buffer_capacity = env_usize("OBS_BUFFER_CAPACITY", DEFAULT_BUFFER_CAPACITY);
        let subscriber_queue = env_usize("OBS_SUBSCRIBER_QUEUE", DEFAULT_SUBSCRIBER_QUEUE);
        Self {
            buffer_capacity,
            subscriber_queue,
            ..Self::default()
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(default)
}
