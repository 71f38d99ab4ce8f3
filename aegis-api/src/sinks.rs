//! Concrete adapters that wire `aegis-llm`'s and `aegis-storage`'s narrow
//! `EventSink`/`StorageEventSink`/`UsageSink` seams to the real
//! `ObservabilityBus`, assembled here rather than in any of those crates so
//! none of them take a dependency on `aegis-events` directly.

use aegis_core::{EntityIdType, IdentityCapsule, ObservabilityEventId, UsageRecord, UsageRecordStatus};
use aegis_events::ObservabilityBus;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

/// Turns a `{event_type, capsule, payload}` triple into an
/// [`aegis_core::ObservabilityEvent`] and pushes it to the bus. Implements
/// both sink traits since their signatures are identical (§4.4, §4.2).
pub struct BusEventSink {
    bus: ObservabilityBus,
    source_app: String,
}

impl BusEventSink {
    pub fn new(bus: ObservabilityBus, source_app: impl Into<String>) -> Self {
        Self { bus, source_app: source_app.into() }
    }

    async fn push(&self, event_type: &str, capsule: &IdentityCapsule, payload: serde_json::Value) {
        let status = if event_type.ends_with(".failed") {
            "failed"
        } else if event_type.ends_with(".completed") || event_type.ends_with(".succeeded") {
            "succeeded"
        } else {
            "running"
        };
        self.bus
            .push(aegis_core::ObservabilityEvent {
                id: ObservabilityEventId::now_v7(),
                capsule: capsule.clone(),
                source_app: self.source_app.clone(),
                event_type: event_type.to_string(),
                status: status.to_string(),
                message: None,
                progress: None,
                step: None,
                payload,
                user_display_name: None,
                timestamp: chrono::Utc::now(),
            })
            .await;
    }
}

#[async_trait]
impl aegis_llm::EventSink for BusEventSink {
    async fn emit(&self, event_type: &str, capsule: &IdentityCapsule, payload: serde_json::Value) {
        self.push(event_type, capsule, payload).await;
    }
}

#[async_trait]
impl aegis_storage::StorageEventSink for BusEventSink {
    async fn emit(&self, event_type: &str, capsule: &IdentityCapsule, payload: serde_json::Value) {
        self.push(event_type, capsule, payload).await;
    }
}

/// Append-only usage log, batched within a small window (§5: "contention
/// minimized by batching within a small window (<=50 ms or 64 records)").
/// No dedicated UsageRecord store exists yet, so this flushes to the
/// durable observability sink's logger rather than a real table.
pub struct BatchingUsageSink {
    pending: Mutex<Vec<UsageRecord>>,
}

const FLUSH_THRESHOLD: usize = 64;
const DEFAULT_FLUSH_WINDOW_MS: u64 = 50;

impl BatchingUsageSink {
    pub fn new() -> Arc<Self> {
        let sink = Arc::new(Self { pending: Mutex::new(Vec::new()) });
        let flusher = sink.clone();
        let window = Self::flush_window_from_env();
        tokio::spawn(async move {
            let mut ticker = interval(window);
            loop {
                ticker.tick().await;
                flusher.flush().await;
            }
        });
        sink
    }

    /// `USAGE_BATCH_WINDOW_MS` (§10.3), falling back to the 50ms default.
    fn flush_window_from_env() -> Duration {
        std::env::var(aegis_core::AmbientEnvKeys::USAGE_BATCH_WINDOW_MS)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_FLUSH_WINDOW_MS))
    }

    async fn flush(&self) {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return;
        }
        for record in pending.drain(..) {
            tracing::info!(
                provider = %record.provider,
                model = %record.model,
                prompt_tokens = record.prompt_tokens,
                completion_tokens = record.completion_tokens,
                cost_cents = record.cost_cents,
                "usage record"
            );
        }
    }
}

impl Default for BatchingUsageSink {
    fn default() -> Self {
        Self { pending: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl aegis_llm::UsageSink for BatchingUsageSink {
    async fn record(&self, record: UsageRecord) {
        let should_flush = {
            let mut pending = self.pending.lock().await;
            pending.push(record);
            pending.len() >= FLUSH_THRESHOLD
        };
        if should_flush {
            self.flush().await;
        }
    }
}
