//! Deliverable half of the Artifact Store's two parallel action sets
//! (§4.2). Same shape and invariants as [`crate::plan_store::PlanStore`],
//! plus `merge_versions`, which only deliverables expose.

use crate::conversation::ConversationStore;
use crate::event_sink::StorageEventSink;
use crate::MAX_CONFLICT_RETRIES;
use aegis_core::{
    ConversationId, CreatedBy, Deliverable, DeliverableId, DeliverableVersion, DeliverableVersionId,
    EntityIdType, IdentityCapsule, StorageError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverableWithCurrentVersion {
    pub deliverable: Deliverable,
    pub current_version: DeliverableVersion,
}

struct Entry {
    deliverable: Deliverable,
    versions: HashMap<DeliverableVersionId, DeliverableVersion>,
    row_version: u32,
}

impl Entry {
    fn next_version_number(&self) -> i64 {
        self.versions.values().map(|v| v.version_number).max().unwrap_or(0) + 1
    }

    fn current_version(&self) -> Result<DeliverableVersion, StorageError> {
        self.versions
            .get(&self.deliverable.current_version_id)
            .cloned()
            .ok_or(StorageError::VersionNotFound(
                self.deliverable.current_version_id.to_string(),
            ))
    }
}

#[derive(Default)]
struct State {
    by_conversation: HashMap<ConversationId, DeliverableId>,
    entries: HashMap<DeliverableId, Entry>,
}

pub struct DeliverableStore {
    state: Arc<RwLock<State>>,
    events: Arc<dyn StorageEventSink>,
}

impl DeliverableStore {
    pub fn new(events: Arc<dyn StorageEventSink>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            events,
        }
    }

    async fn emit(&self, capsule: &IdentityCapsule, event_type: &str, deliverable: &Deliverable) {
        self.events
            .emit(
                event_type,
                capsule,
                serde_json::json!({
                    "deliverableId": deliverable.id.to_string(),
                    "conversationId": deliverable.conversation_id.to_string(),
                }),
            )
            .await;
    }

    fn conversation_id(capsule: &IdentityCapsule) -> Result<ConversationId, StorageError> {
        ConversationStore::parse_id(&capsule.conversation_id)
    }

    /// `create` (§4.2): first call for a conversation makes a new
    /// deliverable at version 1; subsequent calls append a version.
    pub async fn create(
        &self,
        capsule: &IdentityCapsule,
        title: String,
        deliverable_type: String,
        content: String,
        format: String,
        created_by: CreatedBy,
        provider_model: Option<String>,
    ) -> Result<Deliverable, StorageError> {
        let conversation_id = Self::conversation_id(capsule)?;
        let mut guard = self.state.write().await;

        let deliverable = if let Some(&deliverable_id) = guard.by_conversation.get(&conversation_id) {
            let entry = guard.entries.get_mut(&deliverable_id).expect("index/entry desync");
            let version = DeliverableVersion {
                id: DeliverableVersionId::now_v7(),
                deliverable_id,
                version_number: entry.next_version_number(),
                content,
                format,
                deliverable_type: entry.deliverable.deliverable_type.clone(),
                created_by,
                provider_model,
                created_at: chrono::Utc::now(),
            };
            entry.deliverable.current_version_id = version.id;
            entry.versions.insert(version.id, version);
            entry.row_version += 1;
            entry.deliverable.clone()
        } else {
            let deliverable_id = DeliverableId::now_v7();
            let version = DeliverableVersion {
                id: DeliverableVersionId::now_v7(),
                deliverable_id,
                version_number: 1,
                content,
                format,
                deliverable_type: deliverable_type.clone(),
                created_by,
                provider_model,
                created_at: chrono::Utc::now(),
            };
            let deliverable = Deliverable {
                id: deliverable_id,
                conversation_id,
                title,
                deliverable_type,
                current_version_id: version.id,
                deleted: false,
            };
            let mut versions = HashMap::new();
            versions.insert(version.id, version);
            guard.entries.insert(
                deliverable_id,
                Entry {
                    deliverable: deliverable.clone(),
                    versions,
                    row_version: 0,
                },
            );
            guard.by_conversation.insert(conversation_id, deliverable_id);
            deliverable
        };
        drop(guard);
        self.emit(capsule, "artifact.deliverable.created", &deliverable).await;
        Ok(deliverable)
    }

    pub async fn read(&self, deliverable_id: DeliverableId) -> Result<DeliverableWithCurrentVersion, StorageError> {
        let guard = self.state.read().await;
        let entry = guard.entries.get(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        Ok(DeliverableWithCurrentVersion {
            deliverable: entry.deliverable.clone(),
            current_version: entry.current_version()?,
        })
    }

    /// `list` (§4.2): all versions, newest first.
    pub async fn list(&self, deliverable_id: DeliverableId) -> Result<Vec<DeliverableVersion>, StorageError> {
        let guard = self.state.read().await;
        let entry = guard.entries.get(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        let mut versions: Vec<DeliverableVersion> = entry.versions.values().cloned().collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    /// `edit` (§4.2): append a user-authored version and mark it current.
    pub async fn edit(
        &self,
        capsule: &IdentityCapsule,
        deliverable_id: DeliverableId,
        content: String,
    ) -> Result<Deliverable, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        let current = entry.current_version()?;
        let version = DeliverableVersion {
            id: DeliverableVersionId::now_v7(),
            deliverable_id,
            version_number: entry.next_version_number(),
            content,
            format: current.format,
            deliverable_type: entry.deliverable.deliverable_type.clone(),
            created_by: CreatedBy::User,
            provider_model: None,
            created_at: chrono::Utc::now(),
        };
        entry.deliverable.current_version_id = version.id;
        entry.versions.insert(version.id, version);
        entry.row_version += 1;
        let deliverable = entry.deliverable.clone();
        drop(guard);
        self.emit(capsule, "artifact.deliverable.edited", &deliverable).await;
        Ok(deliverable)
    }

    /// `rerun` (§4.2): the runner has already called C4 with `base_version`'s
    /// prompt inputs per `rerunConfig`; this appends the result.
    pub async fn rerun_with_content(
        &self,
        capsule: &IdentityCapsule,
        deliverable_id: DeliverableId,
        base_version_id: DeliverableVersionId,
        content: String,
        provider_model: Option<String>,
    ) -> Result<Deliverable, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        let base = entry
            .versions
            .get(&base_version_id)
            .ok_or(StorageError::VersionNotFound(base_version_id.to_string()))?;
        let format = base.format.clone();
        let version = DeliverableVersion {
            id: DeliverableVersionId::now_v7(),
            deliverable_id,
            version_number: entry.next_version_number(),
            content,
            format,
            deliverable_type: entry.deliverable.deliverable_type.clone(),
            created_by: CreatedBy::Llm,
            provider_model,
            created_at: chrono::Utc::now(),
        };
        entry.deliverable.current_version_id = version.id;
        entry.versions.insert(version.id, version);
        entry.row_version += 1;
        let deliverable = entry.deliverable.clone();
        drop(guard);
        self.emit(capsule, "artifact.deliverable.rerun", &deliverable).await;
        Ok(deliverable)
    }

    /// `merge_versions` (§4.2, deliverables only): the runner has already
    /// called C4 with the named versions and the merge prompt; this appends
    /// the merged result as the new current version.
    pub async fn merge_versions(
        &self,
        capsule: &IdentityCapsule,
        deliverable_id: DeliverableId,
        version_ids: &[DeliverableVersionId],
        merged_content: String,
        provider_model: Option<String>,
    ) -> Result<Deliverable, StorageError> {
        if version_ids.len() < 2 {
            return Err(StorageError::NotFound {
                entity: "deliverable_version",
                id: "merge requires at least two versions".to_string(),
            });
        }
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        for id in version_ids {
            if !entry.versions.contains_key(id) {
                return Err(StorageError::VersionNotFound(id.to_string()));
            }
        }
        let format = entry.current_version()?.format;
        let version = DeliverableVersion {
            id: DeliverableVersionId::now_v7(),
            deliverable_id,
            version_number: entry.next_version_number(),
            content: merged_content,
            format,
            deliverable_type: entry.deliverable.deliverable_type.clone(),
            created_by: CreatedBy::Llm,
            provider_model,
            created_at: chrono::Utc::now(),
        };
        entry.deliverable.current_version_id = version.id;
        entry.versions.insert(version.id, version);
        entry.row_version += 1;
        let deliverable = entry.deliverable.clone();
        drop(guard);
        self.emit(capsule, "artifact.deliverable.merged", &deliverable).await;
        Ok(deliverable)
    }

    /// `set_current` (§4.2): atomically re-point `current`.
    pub async fn set_current(
        &self,
        capsule: &IdentityCapsule,
        deliverable_id: DeliverableId,
        version_id: DeliverableVersionId,
    ) -> Result<Deliverable, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        if !entry.versions.contains_key(&version_id) {
            return Err(StorageError::VersionNotFound(version_id.to_string()));
        }
        entry.deliverable.current_version_id = version_id;
        entry.row_version += 1;
        let deliverable = entry.deliverable.clone();
        drop(guard);
        self.emit(capsule, "artifact.deliverable.current_changed", &deliverable).await;
        Ok(deliverable)
    }

    /// Optimistic-concurrency form of `set_current`, mirroring
    /// [`crate::plan_store::PlanStore::set_current_cas`].
    pub async fn set_current_cas(
        &self,
        capsule: &IdentityCapsule,
        deliverable_id: DeliverableId,
        version_id: DeliverableVersionId,
        expected_row_version: u32,
    ) -> Result<Deliverable, StorageError> {
        let mut attempts = 0;
        loop {
            let mut guard = self.state.write().await;
            let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
                entity: "deliverable",
                id: deliverable_id.to_string(),
            })?;
            if entry.row_version != expected_row_version {
                if attempts >= MAX_CONFLICT_RETRIES {
                    return Err(StorageError::Conflict {
                        entity: "deliverable",
                        id: deliverable_id.to_string(),
                        attempts,
                    });
                }
                attempts += 1;
                continue;
            }
            if !entry.versions.contains_key(&version_id) {
                return Err(StorageError::VersionNotFound(version_id.to_string()));
            }
            entry.deliverable.current_version_id = version_id;
            entry.row_version += 1;
            let deliverable = entry.deliverable.clone();
            drop(guard);
            self.emit(capsule, "artifact.deliverable.current_changed", &deliverable).await;
            return Ok(deliverable);
        }
    }

    /// `copy_version` (§4.2): duplicate a version as the new current,
    /// preserving `createdBy`.
    pub async fn copy_version(
        &self,
        capsule: &IdentityCapsule,
        deliverable_id: DeliverableId,
        version_id: DeliverableVersionId,
    ) -> Result<Deliverable, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        let source = entry
            .versions
            .get(&version_id)
            .cloned()
            .ok_or(StorageError::VersionNotFound(version_id.to_string()))?;
        let copy = DeliverableVersion {
            id: DeliverableVersionId::now_v7(),
            deliverable_id,
            version_number: entry.next_version_number(),
            content: source.content,
            format: source.format,
            deliverable_type: source.deliverable_type,
            created_by: source.created_by,
            provider_model: source.provider_model,
            created_at: chrono::Utc::now(),
        };
        entry.deliverable.current_version_id = copy.id;
        entry.versions.insert(copy.id, copy);
        entry.row_version += 1;
        let deliverable = entry.deliverable.clone();
        drop(guard);
        self.emit(capsule, "artifact.deliverable.version_copied", &deliverable).await;
        Ok(deliverable)
    }

    /// `delete_version` (§4.2): remove a version; if it was current, promote
    /// the most recent remaining one. Refuses to remove the last version.
    pub async fn delete_version(
        &self,
        capsule: &IdentityCapsule,
        deliverable_id: DeliverableId,
        version_id: DeliverableVersionId,
    ) -> Result<Deliverable, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        if !entry.versions.contains_key(&version_id) {
            return Err(StorageError::VersionNotFound(version_id.to_string()));
        }
        if entry.versions.len() == 1 {
            return Err(StorageError::CannotDeleteLast(deliverable_id.to_string()));
        }
        entry.versions.remove(&version_id);
        if entry.deliverable.current_version_id == version_id {
            let promoted = entry
                .versions
                .values()
                .max_by_key(|v| v.version_number)
                .expect("at least one version remains")
                .id;
            entry.deliverable.current_version_id = promoted;
        }
        entry.row_version += 1;
        let deliverable = entry.deliverable.clone();
        drop(guard);
        self.emit(capsule, "artifact.deliverable.version_deleted", &deliverable).await;
        Ok(deliverable)
    }

    /// `delete` (§4.2): soft-delete the deliverable and free its
    /// conversation slot.
    pub async fn delete(&self, capsule: &IdentityCapsule, deliverable_id: DeliverableId) -> Result<(), StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&deliverable_id).ok_or(StorageError::NotFound {
            entity: "deliverable",
            id: deliverable_id.to_string(),
        })?;
        entry.deliverable.deleted = true;
        let conversation_id = entry.deliverable.conversation_id;
        let deliverable = entry.deliverable.clone();
        guard.by_conversation.remove(&conversation_id);
        drop(guard);
        self.emit(capsule, "artifact.deliverable.deleted", &deliverable).await;
        Ok(())
    }
}
