//! The Observability Bus itself (§4.5): a ring buffer of capacity `B` for
//! history, a broadcast channel of capacity `K` for live fan-out, a username
//! enrichment cache, and a durable sink appended to on every push.

use crate::config::ObservabilityBusConfig;
use crate::enrichment::EnrichmentCache;
use crate::filter::SubscriptionFilter;
use crate::sink::DurableSink;
use aegis_core::ObservabilityEvent;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Shared handle to the Observability Bus. Clone cheaply; all state is
/// behind `Arc`.
#[derive(Clone)]
pub struct ObservabilityBus {
    inner: Arc<Inner>,
}

struct Inner {
    config: ObservabilityBusConfig,
    ring: RwLock<VecDeque<ObservabilityEvent>>,
    dropped: AtomicU64,
    subscriber_drops: AtomicU64,
    tx: broadcast::Sender<ObservabilityEvent>,
    enrichment: Arc<EnrichmentCache>,
    durable: Arc<dyn DurableSink>,
}

impl ObservabilityBus {
    pub fn new(
        config: ObservabilityBusConfig,
        enrichment: Arc<EnrichmentCache>,
        durable: Arc<dyn DurableSink>,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(config.subscriber_queue);
        Self {
            inner: Arc::new(Inner {
                config,
                ring: RwLock::new(VecDeque::with_capacity(config.buffer_capacity)),
                dropped: AtomicU64::new(0),
                subscriber_drops: AtomicU64::new(0),
                tx,
                enrichment,
                durable,
            }),
        }
    }

    /// Non-blocking push (§4.5): enriches from cache (never blocks on a
    /// miss — a background fill is spawned instead), appends to the ring
    /// buffer (dropping the oldest entry on overflow), fans out to live
    /// subscribers, and appends to the durable sink in the background.
    pub async fn push(&self, mut event: ObservabilityEvent) {
        if let Some(display_name) = self.inner.enrichment.try_get(&event.capsule.user_id).await {
            event.user_display_name = Some(display_name);
        } else {
            self.inner.enrichment.spawn_fill(event.capsule.user_id.clone());
        }

        {
            let mut ring = self.inner.ring.write().await;
            ring.push_back(event.clone());
            if ring.len() > self.inner.config.buffer_capacity {
                ring.pop_front();
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }

        // No receivers is not an error condition for the bus.
        let _ = self.inner.tx.send(event.clone());

        let durable = self.inner.durable.clone();
        tokio::spawn(async move {
            if let Err(err) = durable.append(event).await {
                tracing::warn!(error = %err, "durable observability sink append failed");
            }
        });
    }

    /// Number of ring-buffer entries dropped to overflow since startup.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Number of subscribers dropped for lagging past the broadcast
    /// channel's capacity (`OBS_SUBSCRIBER_QUEUE`) since startup. Distinct
    /// from [`Self::dropped_count`], which counts ring-buffer (history)
    /// overflow rather than live fan-out.
    pub fn subscriber_drop_count(&self) -> u64 {
        self.inner.subscriber_drops.load(Ordering::Relaxed)
    }

    /// Subscribe to the live event stream (§4.5), filtered server-side.
    /// The stream ends when the subscriber lags past the broadcast
    /// channel's capacity or the bus is dropped — matching "slow
    /// subscribers are dropped after K queued events".
    pub fn subscribe(
        &self,
        filter: SubscriptionFilter,
    ) -> Pin<Box<dyn Stream<Item = ObservabilityEvent> + Send>> {
        let rx = self.inner.tx.subscribe();
        let inner = self.inner.clone();
        Box::pin(futures_util::stream::unfold((rx, inner), move |(mut rx, inner)| {
            let filter = filter.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => {
                            if filter.matches(&event) {
                                return Some((event, (rx, inner)));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            inner.subscriber_drops.fetch_add(1, Ordering::Relaxed);
                            return None;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        }))
    }

    /// Historical query (§4.5), capped at 5000 regardless of the requested
    /// `limit`.
    pub async fn history(
        &self,
        since: DateTime<Utc>,
        until: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<ObservabilityEvent>, crate::sink::SinkError> {
        self.inner.durable.history(since, until, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::InMemoryDurableSink;
    use aegis_core::{EntityIdType, IdentityCapsule, ObservabilityEventId};
    use futures_util::StreamExt;

    fn event(user_id: &str) -> ObservabilityEvent {
        ObservabilityEvent {
            id: ObservabilityEventId::now_v7(),
            capsule: IdentityCapsule {
                org_slug: "acme".into(),
                user_id: user_id.into(),
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
            timestamp: Utc::now(),
        }
    }

    fn bus() -> ObservabilityBus {
        ObservabilityBus::new(
            ObservabilityBusConfig::default(),
            Arc::new(EnrichmentCache::with_null_directory(10, std::time::Duration::from_secs(60))),
            Arc::new(InMemoryDurableSink::new()),
        )
    }

    #[tokio::test]
    async fn subscriber_receives_pushed_event_in_order() {
        let bus = bus();
        let mut stream = bus.subscribe(SubscriptionFilter::default());
        bus.push(event("u1")).await;
        bus.push(event("u2")).await;

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(first.capsule.user_id, "u1");
        assert_eq!(second.capsule.user_id, "u2");
    }

    #[tokio::test]
    async fn subscriber_filters_by_user_id() {
        let bus = bus();
        let mut stream = bus.subscribe(SubscriptionFilter {
            user_id: Some("u1".into()),
            ..Default::default()
        });
        bus.push(event("u2")).await;
        bus.push(event("u1")).await;

        let matched = stream.next().await.unwrap();
        assert_eq!(matched.capsule.user_id, "u1");
    }

    #[tokio::test]
    async fn ring_buffer_drops_oldest_on_overflow() {
        let config = ObservabilityBusConfig {
            buffer_capacity: 2,
            ..ObservabilityBusConfig::default()
        };
        let bus = ObservabilityBus::new(
            config,
            Arc::new(EnrichmentCache::with_null_directory(10, std::time::Duration::from_secs(60))),
            Arc::new(InMemoryDurableSink::new()),
        );
        bus.push(event("u1")).await;
        bus.push(event("u2")).await;
        bus.push(event("u3")).await;
        assert_eq!(bus.dropped_count(), 1);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_without_starving_others() {
        let config = ObservabilityBusConfig {
            subscriber_queue: 8,
            ..ObservabilityBusConfig::default()
        };
        let bus = ObservabilityBus::new(
            config,
            Arc::new(EnrichmentCache::with_null_directory(10, std::time::Duration::from_secs(60))),
            Arc::new(InMemoryDurableSink::new()),
        );

        // `lagging` never polls until after 200 events have been pushed, so
        // it overruns the 8-slot broadcast channel and is dropped.
        let mut lagging = bus.subscribe(SubscriptionFilter::default());
        let mut attentive = bus.subscribe(SubscriptionFilter::default());

        let pump = tokio::spawn({
            let mut attentive_count = 0;
            async move {
                while attentive_count < 200 {
                    attentive.next().await.unwrap();
                    attentive_count += 1;
                }
            }
        });

        for i in 0..200 {
            bus.push(event(&format!("u{i}"))).await;
        }
        pump.await.unwrap();

        assert!(lagging.next().await.is_none());
        assert!(bus.subscriber_drop_count() >= 200 - 8);
    }

    #[tokio::test]
    async fn history_reads_through_to_durable_sink() {
        let bus = bus();
        let before = Utc::now() - chrono::Duration::seconds(1);
        bus.push(event("u1")).await;
        // Durable append is backgrounded; give it a moment to land.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let results = bus.history(before, None, 10).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
