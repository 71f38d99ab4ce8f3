//! Durable append sink (§4.5): every bus event is appended here regardless
//! of subscriber fan-out; failures are logged and never block `push`.
//! `history` reads back from this sink, capped at 5000.

use aegis_core::ObservabilityEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("durable sink lock poisoned")]
    LockPoisoned,
}

/// The historical read side of the bus (§4.5 `history(since, until?, limit)`).
const MAX_HISTORY_LIMIT: usize = 5000;

#[async_trait]
pub trait DurableSink: Send + Sync {
    async fn append(&self, event: ObservabilityEvent) -> Result<(), SinkError>;

    async fn history(
        &self,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ObservabilityEvent>, SinkError>;
}

/// Append-only in-memory sink built on the workspace's usual
/// `Arc<RwLock<HashMap<..>>>` storage idiom. Suitable for a reference
/// deployment or tests; a production sink would persist instead.
#[derive(Default)]
pub struct InMemoryDurableSink {
    events: Arc<RwLock<Vec<ObservabilityEvent>>>,
}

impl InMemoryDurableSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableSink for InMemoryDurableSink {
    async fn append(&self, event: ObservabilityEvent) -> Result<(), SinkError> {
        let mut events = self.events.write().map_err(|_| SinkError::LockPoisoned)?;
        events.push(event);
        Ok(())
    }

    async fn history(
        &self,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ObservabilityEvent>, SinkError> {
        let events = self.events.read().map_err(|_| SinkError::LockPoisoned)?;
        let capped = limit.min(MAX_HISTORY_LIMIT);
        let matched = events
            .iter()
            .filter(|e| e.timestamp >= since && until.map(|u| e.timestamp <= u).unwrap_or(true))
            .take(capped)
            .cloned()
            .collect();
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{EntityIdType, IdentityCapsule, ObservabilityEventId};

    fn event(timestamp: DateTime<Utc>) -> ObservabilityEvent {
        ObservabilityEvent {
            id: ObservabilityEventId::now_v7(),
            capsule: IdentityCapsule {
                org_slug: "acme".into(),
                user_id: "u1".into(),
                conversation_id: "conv-1".into(),
                agent_slug: "writer".into(),
                agent_type: "context".into(),
                provider: "openai".into(),
                model: "gpt-5".into(),
                task_id: None,
                plan_id: None,
                deliverable_id: None,
            },
            source_app: "aegis-runtime".into(),
            event_type: "task.started".into(),
            status: "running".into(),
            message: None,
            progress: None,
            step: None,
            payload: serde_json::json!({}),
            user_display_name: None,
            timestamp,
        }
    }

    #[tokio::test]
    async fn history_filters_by_time_window_and_caps_limit() {
        let sink = InMemoryDurableSink::new();
        let base = Utc::now();
        for offset in 0..10 {
            sink.append(event(base + chrono::Duration::seconds(offset)))
                .await
                .unwrap();
        }
        let results = sink.history(base, Some(base + chrono::Duration::seconds(3)), 100).await.unwrap();
        assert_eq!(results.len(), 4);

        let capped = sink.history(base, None, 2).await.unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn requested_limit_above_max_is_clamped() {
        let sink = InMemoryDurableSink::new();
        let base = Utc::now();
        for offset in 0..5 {
            sink.append(event(base + chrono::Duration::seconds(offset)))
                .await
                .unwrap();
        }
        let results = sink.history(base, None, 100_000).await.unwrap();
        assert_eq!(results.len(), 5);
    }
}
