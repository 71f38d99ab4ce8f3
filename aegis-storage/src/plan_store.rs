//! Plan half of the Artifact Store's two parallel action sets (§4.2).
//!
//! The reference backend here is a single `RwLock` guarding the whole
//! table: every mutation runs inside one critical section, which satisfies
//! "concurrent actions on the same plan are serialized" directly — there is
//! no lost-update window to retry around. `row_version` is still tracked on
//! every entry and `set_current_cas` exposes the literal
//! optimistic-concurrency-with-retry contract for callers (the HTTP PATCH
//! route) holding a version number from an earlier `read`.

use crate::conversation::ConversationStore;
use crate::event_sink::StorageEventSink;
use crate::MAX_CONFLICT_RETRIES;
use aegis_core::{
    ConversationId, CreatedBy, EntityIdType, IdentityCapsule, Plan, PlanId, PlanVersion, PlanVersionId,
    StorageError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A plan with its current version inlined, the `read` action's shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWithCurrentVersion {
    pub plan: Plan,
    pub current_version: PlanVersion,
}

struct Entry {
    plan: Plan,
    versions: HashMap<PlanVersionId, PlanVersion>,
    row_version: u32,
}

impl Entry {
    fn next_version_number(&self) -> i64 {
        self.versions.values().map(|v| v.version_number).max().unwrap_or(0) + 1
    }

    fn current_version(&self) -> Result<PlanVersion, StorageError> {
        self.versions
            .get(&self.plan.current_version_id)
            .cloned()
            .ok_or(StorageError::VersionNotFound(self.plan.current_version_id.to_string()))
    }
}

#[derive(Default)]
struct State {
    by_conversation: HashMap<ConversationId, PlanId>,
    entries: HashMap<PlanId, Entry>,
}

pub struct PlanStore {
    state: Arc<RwLock<State>>,
    events: Arc<dyn StorageEventSink>,
}

impl PlanStore {
    pub fn new(events: Arc<dyn StorageEventSink>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            events,
        }
    }

    async fn emit(&self, capsule: &IdentityCapsule, event_type: &str, plan: &Plan) {
        self.events
            .emit(
                event_type,
                capsule,
                serde_json::json!({"planId": plan.id.to_string(), "conversationId": plan.conversation_id.to_string()}),
            )
            .await;
    }

    fn conversation_id(capsule: &IdentityCapsule) -> Result<ConversationId, StorageError> {
        ConversationStore::parse_id(&capsule.conversation_id)
    }

    /// `create` (§4.2): first call for a conversation makes a new plan at
    /// version 1; subsequent calls append a version to the existing plan.
    pub async fn create(
        &self,
        capsule: &IdentityCapsule,
        title: String,
        content: String,
        format: String,
        created_by: CreatedBy,
        provider_model: Option<String>,
    ) -> Result<Plan, StorageError> {
        let conversation_id = Self::conversation_id(capsule)?;
        let mut guard = self.state.write().await;

        let plan = if let Some(&plan_id) = guard.by_conversation.get(&conversation_id) {
            let entry = guard.entries.get_mut(&plan_id).expect("index/entry desync");
            let version = PlanVersion {
                id: PlanVersionId::now_v7(),
                plan_id,
                version_number: entry.next_version_number(),
                content,
                format,
                created_by,
                provider_model,
                created_at: chrono::Utc::now(),
            };
            entry.plan.current_version_id = version.id;
            entry.versions.insert(version.id, version);
            entry.row_version += 1;
            entry.plan.clone()
        } else {
            let plan_id = PlanId::now_v7();
            let version = PlanVersion {
                id: PlanVersionId::now_v7(),
                plan_id,
                version_number: 1,
                content,
                format,
                created_by,
                provider_model,
                created_at: chrono::Utc::now(),
            };
            let plan = Plan {
                id: plan_id,
                conversation_id,
                title,
                current_version_id: version.id,
                created_at: chrono::Utc::now(),
                deleted: false,
            };
            let mut versions = HashMap::new();
            versions.insert(version.id, version);
            guard.entries.insert(
                plan_id,
                Entry {
                    plan: plan.clone(),
                    versions,
                    row_version: 0,
                },
            );
            guard.by_conversation.insert(conversation_id, plan_id);
            plan
        };
        drop(guard);
        self.emit(capsule, "artifact.plan.created", &plan).await;
        Ok(plan)
    }

    /// The Plan -> Build coupling rule (§4.2) is a contract on the runner,
    /// not the store, but the runner needs a way to find "the conversation's
    /// current plan" to honor it.
    pub async fn current_for_conversation(&self, conversation_id: ConversationId) -> Option<PlanWithCurrentVersion> {
        let guard = self.state.read().await;
        let plan_id = *guard.by_conversation.get(&conversation_id)?;
        let entry = guard.entries.get(&plan_id)?;
        Some(PlanWithCurrentVersion {
            plan: entry.plan.clone(),
            current_version: entry.current_version().ok()?,
        })
    }

    pub async fn read(&self, plan_id: PlanId) -> Result<PlanWithCurrentVersion, StorageError> {
        let guard = self.state.read().await;
        let entry = guard.entries.get(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        Ok(PlanWithCurrentVersion {
            plan: entry.plan.clone(),
            current_version: entry.current_version()?,
        })
    }

    /// `list` (§4.2): all versions, newest first.
    pub async fn list(&self, plan_id: PlanId) -> Result<Vec<PlanVersion>, StorageError> {
        let guard = self.state.read().await;
        let entry = guard.entries.get(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        let mut versions: Vec<PlanVersion> = entry.versions.values().cloned().collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    /// `edit` (§4.2): append a user-authored version and mark it current.
    pub async fn edit(&self, capsule: &IdentityCapsule, plan_id: PlanId, content: String) -> Result<Plan, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        let format = entry.current_version()?.format;
        let version = PlanVersion {
            id: PlanVersionId::now_v7(),
            plan_id,
            version_number: entry.next_version_number(),
            content,
            format,
            created_by: CreatedBy::User,
            provider_model: None,
            created_at: chrono::Utc::now(),
        };
        entry.plan.current_version_id = version.id;
        entry.versions.insert(version.id, version);
        entry.row_version += 1;
        let plan = entry.plan.clone();
        drop(guard);
        self.emit(capsule, "artifact.plan.edited", &plan).await;
        Ok(plan)
    }

    /// `rerun` (§4.2): the runner has already called C4 with `base_version`'s
    /// prompt inputs per `rerunConfig`; this appends the regenerated content
    /// as a new current, llm-authored version.
    pub async fn rerun_with_content(
        &self,
        capsule: &IdentityCapsule,
        plan_id: PlanId,
        base_version_id: PlanVersionId,
        content: String,
        provider_model: Option<String>,
    ) -> Result<Plan, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        let base = entry
            .versions
            .get(&base_version_id)
            .ok_or(StorageError::VersionNotFound(base_version_id.to_string()))?;
        let format = base.format.clone();
        let version = PlanVersion {
            id: PlanVersionId::now_v7(),
            plan_id,
            version_number: entry.next_version_number(),
            content,
            format,
            created_by: CreatedBy::Llm,
            provider_model,
            created_at: chrono::Utc::now(),
        };
        entry.plan.current_version_id = version.id;
        entry.versions.insert(version.id, version);
        entry.row_version += 1;
        let plan = entry.plan.clone();
        drop(guard);
        self.emit(capsule, "artifact.plan.rerun", &plan).await;
        Ok(plan)
    }

    /// `set_current` (§4.2): atomically re-point `current`.
    pub async fn set_current(
        &self,
        capsule: &IdentityCapsule,
        plan_id: PlanId,
        version_id: PlanVersionId,
    ) -> Result<Plan, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        if !entry.versions.contains_key(&version_id) {
            return Err(StorageError::VersionNotFound(version_id.to_string()));
        }
        entry.plan.current_version_id = version_id;
        entry.row_version += 1;
        let plan = entry.plan.clone();
        drop(guard);
        self.emit(capsule, "artifact.plan.current_changed", &plan).await;
        Ok(plan)
    }

    /// Optimistic-concurrency form of `set_current`: the caller supplies the
    /// `row_version` it observed from an earlier `read`. If another mutation
    /// has landed since, retries up to [`crate::MAX_CONFLICT_RETRIES`] times
    /// before surfacing [`StorageError::Conflict`].
    pub async fn set_current_cas(
        &self,
        capsule: &IdentityCapsule,
        plan_id: PlanId,
        version_id: PlanVersionId,
        expected_row_version: u32,
    ) -> Result<Plan, StorageError> {
        let mut attempts = 0;
        loop {
            {
                let mut guard = self.state.write().await;
                let entry = guard.entries.get_mut(&plan_id).ok_or(StorageError::NotFound {
                    entity: "plan",
                    id: plan_id.to_string(),
                })?;
                if entry.row_version != expected_row_version {
                    if attempts >= MAX_CONFLICT_RETRIES {
                        return Err(StorageError::Conflict {
                            entity: "plan",
                            id: plan_id.to_string(),
                            attempts,
                        });
                    }
                    attempts += 1;
                    continue;
                }
                if !entry.versions.contains_key(&version_id) {
                    return Err(StorageError::VersionNotFound(version_id.to_string()));
                }
                entry.plan.current_version_id = version_id;
                entry.row_version += 1;
                let plan = entry.plan.clone();
                drop(guard);
                self.emit(capsule, "artifact.plan.current_changed", &plan).await;
                return Ok(plan);
            }
        }
    }

    /// `copy_version` (§4.2): duplicate a version as the new current,
    /// preserving `createdBy`.
    pub async fn copy_version(
        &self,
        capsule: &IdentityCapsule,
        plan_id: PlanId,
        version_id: PlanVersionId,
    ) -> Result<Plan, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        let source = entry
            .versions
            .get(&version_id)
            .cloned()
            .ok_or(StorageError::VersionNotFound(version_id.to_string()))?;
        let copy = PlanVersion {
            id: PlanVersionId::now_v7(),
            plan_id,
            version_number: entry.next_version_number(),
            content: source.content,
            format: source.format,
            created_by: source.created_by,
            provider_model: source.provider_model,
            created_at: chrono::Utc::now(),
        };
        entry.plan.current_version_id = copy.id;
        entry.versions.insert(copy.id, copy);
        entry.row_version += 1;
        let plan = entry.plan.clone();
        drop(guard);
        self.emit(capsule, "artifact.plan.version_copied", &plan).await;
        Ok(plan)
    }

    /// `delete_version` (§4.2): remove a version; if it was current, promote
    /// the most recent remaining one. Refuses to remove the last version.
    pub async fn delete_version(
        &self,
        capsule: &IdentityCapsule,
        plan_id: PlanId,
        version_id: PlanVersionId,
    ) -> Result<Plan, StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        if !entry.versions.contains_key(&version_id) {
            return Err(StorageError::VersionNotFound(version_id.to_string()));
        }
        if entry.versions.len() == 1 {
            return Err(StorageError::CannotDeleteLast(plan_id.to_string()));
        }
        entry.versions.remove(&version_id);
        if entry.plan.current_version_id == version_id {
            let promoted = entry
                .versions
                .values()
                .max_by_key(|v| v.version_number)
                .expect("at least one version remains")
                .id;
            entry.plan.current_version_id = promoted;
        }
        entry.row_version += 1;
        let plan = entry.plan.clone();
        drop(guard);
        self.emit(capsule, "artifact.plan.version_deleted", &plan).await;
        Ok(plan)
    }

    /// `delete` (§4.2): soft-delete the plan and free its conversation slot.
    pub async fn delete(&self, capsule: &IdentityCapsule, plan_id: PlanId) -> Result<(), StorageError> {
        let mut guard = self.state.write().await;
        let entry = guard.entries.get_mut(&plan_id).ok_or(StorageError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        entry.plan.deleted = true;
        let conversation_id = entry.plan.conversation_id;
        let plan = entry.plan.clone();
        guard.by_conversation.remove(&conversation_id);
        drop(guard);
        self.emit(capsule, "artifact.plan.deleted", &plan).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sink::NullStorageEventSink;

    fn capsule(conversation_id: ConversationId) -> IdentityCapsule {
        IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: conversation_id.to_string(),
            agent_slug: "writer".into(),
            agent_type: "context".into(),
            provider: "openai".into(),
            model: "gpt-5".into(),
            task_id: None,
            plan_id: None,
            deliverable_id: None,
        }
    }

    fn store() -> PlanStore {
        PlanStore::new(Arc::new(NullStorageEventSink))
    }

    #[tokio::test]
    async fn create_twice_for_same_conversation_appends_a_version() {
        let store = store();
        let conversation_id = ConversationId::now_v7();
        let capsule = capsule(conversation_id);

        let first = store
            .create(&capsule, "P".into(), "draft one".into(), "markdown".into(), CreatedBy::User, None)
            .await
            .unwrap();
        let second = store
            .create(&capsule, "P".into(), "draft two".into(), "markdown".into(), CreatedBy::User, None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let versions = store.list(first.id).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version_number, 2);
    }

    #[tokio::test]
    async fn edit_appends_user_authored_current_version() {
        let store = store();
        let capsule = capsule(ConversationId::now_v7());
        let plan = store
            .create(&capsule, "P".into(), "v1".into(), "markdown".into(), CreatedBy::Llm, Some("openai/gpt-5".into()))
            .await
            .unwrap();

        let edited = store.edit(&capsule, plan.id, "v2 by hand".into()).await.unwrap();
        let read = store.read(edited.id).await.unwrap();
        assert_eq!(read.current_version.content, "v2 by hand");
        assert_eq!(read.current_version.created_by, CreatedBy::User);
        assert_eq!(read.current_version.version_number, 2);
    }

    #[tokio::test]
    async fn delete_version_promotes_most_recent_remaining() {
        let store = store();
        let capsule = capsule(ConversationId::now_v7());
        let plan = store
            .create(&capsule, "P".into(), "v1".into(), "markdown".into(), CreatedBy::User, None)
            .await
            .unwrap();
        store.edit(&capsule, plan.id, "v2".into()).await.unwrap();
        let v3 = store.edit(&capsule, plan.id, "v3".into()).await.unwrap();

        store.delete_version(&capsule, plan.id, v3.current_version_id).await.unwrap();
        let read = store.read(plan.id).await.unwrap();
        assert_eq!(read.current_version.content, "v2");
    }

    #[tokio::test]
    async fn delete_version_refuses_to_remove_the_last_one() {
        let store = store();
        let capsule = capsule(ConversationId::now_v7());
        let plan = store
            .create(&capsule, "P".into(), "only".into(), "markdown".into(), CreatedBy::User, None)
            .await
            .unwrap();
        let err = store
            .delete_version(&capsule, plan.id, plan.current_version_id)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::CannotDeleteLast(_)));
    }

    #[tokio::test]
    async fn set_current_cas_conflicts_on_stale_row_version() {
        let store = store();
        let capsule = capsule(ConversationId::now_v7());
        let plan = store
            .create(&capsule, "P".into(), "v1".into(), "markdown".into(), CreatedBy::User, None)
            .await
            .unwrap();
        let v2 = store.edit(&capsule, plan.id, "v2".into()).await.unwrap();
        // Row version has already moved past 0 (create) -> this caller still thinks it's 0.
        let err = store
            .set_current_cas(&capsule, plan.id, v2.current_version_id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_frees_the_conversation_slot_for_a_fresh_plan() {
        let store = store();
        let conversation_id = ConversationId::now_v7();
        let capsule = capsule(conversation_id);
        let first = store
            .create(&capsule, "P".into(), "v1".into(), "markdown".into(), CreatedBy::User, None)
            .await
            .unwrap();
        store.delete(&capsule, first.id).await.unwrap();

        let second = store
            .create(&capsule, "P2".into(), "v1".into(), "markdown".into(), CreatedBy::User, None)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }
}
