//! Username enrichment cache (§4.5): resolves `userId -> displayName`
//! before fan-out. Size-bounded with a TTL; a miss fills asynchronously and
//! only tags events pushed after the fill completes. Enrichment failure
//! never blocks delivery — `resolve` never returns an error, only `None`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Looks up a display name for a user id. Implemented by whatever owns the
/// user directory (an external service, a storage table); the bus only
/// needs this narrow seam.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Option<String>;
}

/// A directory that never resolves anything; events are delivered without
/// `userDisplayName` tagged.
pub struct NullUserDirectory;

#[async_trait]
impl UserDirectory for NullUserDirectory {
    async fn display_name(&self, _user_id: &str) -> Option<String> {
        None
    }
}

struct CacheEntry {
    display_name: String,
    expires_at: Instant,
}

/// Size-bounded, TTL'd cache fronting a [`UserDirectory`]. `capacity` bounds
/// the number of entries; the oldest-inserted entry is evicted on overflow
/// (a simple bound, not a true LRU — enrichment is best-effort).
pub struct EnrichmentCache {
    directory: Arc<dyn UserDirectory>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    insertion_order: RwLock<Vec<String>>,
    capacity: usize,
    ttl: Duration,
}

impl EnrichmentCache {
    pub fn new(directory: Arc<dyn UserDirectory>, capacity: usize, ttl: Duration) -> Self {
        Self {
            directory,
            entries: RwLock::new(HashMap::new()),
            insertion_order: RwLock::new(Vec::new()),
            capacity,
            ttl,
        }
    }

    pub fn with_null_directory(capacity: usize, ttl: Duration) -> Self {
        Self::new(Arc::new(NullUserDirectory), capacity, ttl)
    }

    /// Non-blocking cache read: `Some` on a live hit, `None` on a miss or
    /// expired entry. Never calls the directory.
    pub async fn try_get(&self, user_id: &str) -> Option<String> {
        let entries = self.entries.read().await;
        match entries.get(user_id) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.display_name.clone()),
            _ => None,
        }
    }

    /// On a miss, spawn a background fill so the caller never blocks on the
    /// directory lookup; subsequent `try_get` calls pick up the result.
    pub fn spawn_fill(self: &Arc<Self>, user_id: String) {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Some(display_name) = cache.directory.display_name(&user_id).await {
                cache.insert(user_id, display_name).await;
            }
        });
    }

    async fn insert(&self, user_id: String, display_name: String) {
        let mut entries = self.entries.write().await;
        let mut order = self.insertion_order.write().await;
        if !entries.contains_key(&user_id) && entries.len() >= self.capacity {
            if let Some(oldest) = order.first().cloned() {
                entries.remove(&oldest);
                order.remove(0);
            }
        }
        if !entries.contains_key(&user_id) {
            order.push(user_id.clone());
        }
        entries.insert(
            user_id,
            CacheEntry {
                display_name,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}
