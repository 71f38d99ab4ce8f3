//! One task per request (§3). Terminal statuses are write-once.

use aegis_core::{ConversationId, EntityIdType, RunnerMode, StorageError, Task, TaskId, TaskStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct TaskStore {
    by_id: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, conversation_id: ConversationId, mode: RunnerMode) -> Task {
        let task = Task {
            id: TaskId::now_v7(),
            conversation_id,
            mode,
            status: TaskStatus::Pending,
            started_at: chrono::Utc::now(),
            completed_at: None,
        };
        self.by_id.write().await.insert(task.id, task.clone());
        task
    }

    pub async fn get(&self, id: TaskId) -> Result<Task, StorageError> {
        self.by_id
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound {
                entity: "task",
                id: id.to_string(),
            })
    }

    /// Moves a task to `status`. Once a task reaches a terminal status it is
    /// write-once: a further transition request is a no-op that returns the
    /// task unchanged rather than erroring, since it reflects a duplicate
    /// completion signal racing the first.
    pub async fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, StorageError> {
        let mut guard = self.by_id.write().await;
        let task = guard.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "task",
            id: id.to_string(),
        })?;
        if task.status.is_terminal() {
            return Ok(task.clone());
        }
        task.status = status;
        if status.is_terminal() {
            task.completed_at = Some(chrono::Utc::now());
        }
        Ok(task.clone())
    }
}
