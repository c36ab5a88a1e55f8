//! In-memory registry of submitted jobs.
//!
//! The registry is the only state shared between the submitter, the
//! per-job monitors, and callers polling for progress. Every read returns a
//! clone taken under the lock and every write applies all of its field
//! changes under one write guard, so readers never observe a half-updated
//! task.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use roadwatch_core::{Error, Result, Task};

#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task. An id that is already registered is rejected.
    pub async fn create(&self, task: Task) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(Error::InvalidInput(format!(
                "Task {} is already registered",
                task.id
            )));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    /// Snapshot of one task.
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Like [`get`](Self::get) but unknown ids are an error.
    pub async fn require(&self, id: &str) -> Result<Task> {
        self.get(id)
            .await
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Apply `f` to the task atomically and return the updated snapshot.
    ///
    /// A terminal task keeps its status: an update that would move it to a
    /// different status is rejected and nothing is written.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write().await;
        let current = tasks
            .get(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

        let mut next = current.clone();
        f(&mut next);
        if current.is_terminal() && next.status != current.status {
            return Err(Error::InvalidInput(format!(
                "Task {} is {:?} and cannot move to {:?}",
                id, current.status, next.status
            )));
        }
        next.updated_at = Utc::now();
        tasks.insert(id.to_string(), next.clone());
        Ok(next)
    }

    /// Replace the snapshot list, e.g. frames captured by a live client.
    pub async fn update_snapshots(&self, id: &str, snapshots: Vec<String>) -> Result<Task> {
        self.update(id, |task| task.snapshot_paths = snapshots).await
    }

    /// All tasks, oldest first.
    pub async fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
