//! Conversation bookkeeping (§3): created by the Dispatcher on first
//! request if absent, touched on every subsequent one.

use aegis_core::{Conversation, ConversationId, EntityIdType, StorageError};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ConversationStore {
    by_id: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the capsule's opaque `conversationId` string as the row's id.
    /// Invalid input is indistinguishable from "unknown conversation".
    pub fn parse_id(raw: &str) -> Result<ConversationId, StorageError> {
        ConversationId::from_str(raw).map_err(|_| StorageError::ConversationNotFound(raw.to_string()))
    }

    /// Creates the row on first sight of this id; otherwise bumps `lastActiveAt`.
    pub async fn ensure(&self, id: ConversationId, user_id: &str, agent_slug: &str) -> Conversation {
        let mut guard = self.by_id.write().await;
        if let Some(existing) = guard.get_mut(&id) {
            existing.last_active_at = chrono::Utc::now();
            return existing.clone();
        }
        let now = chrono::Utc::now();
        let conversation = Conversation {
            id,
            user_id: user_id.to_string(),
            agent_slug: agent_slug.to_string(),
            started_at: now,
            last_active_at: now,
        };
        guard.insert(id, conversation.clone());
        conversation
    }

    pub async fn get(&self, id: ConversationId) -> Result<Conversation, StorageError> {
        self.by_id
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::ConversationNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_creates_once_and_touches_after() {
        let store = ConversationStore::new();
        let id = ConversationId::now_v7();
        let first = store.ensure(id, "u1", "writer").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.ensure(id, "u1", "writer").await;
        assert_eq!(first.id, second.id);
        assert!(second.last_active_at >= first.last_active_at);
    }

    #[tokio::test]
    async fn get_unknown_conversation_fails() {
        let store = ConversationStore::new();
        let err = store.get(ConversationId::now_v7()).await.unwrap_err();
        assert!(matches!(err, StorageError::ConversationNotFound(_)));
    }
}
