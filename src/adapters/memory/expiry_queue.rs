//! In-memory expiry task queue for testing.
//!
//! Deterministic stand-in for the Postgres-backed queue. Tasks live in a
//! plain vector behind a lock; `due` scans it the same way the real
//! queue's indexed query does.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, TaskId, Timestamp};
use crate::ports::{ExpiryQueue, ExpiryTask, TaskStatus};

/// In-memory expiry queue for testing.
///
/// # Panics
///
/// Methods panic if the internal lock is poisoned. Acceptable for test
/// code; production uses the Postgres adapter.
pub struct InMemoryExpiryQueue {
    tasks: RwLock<Vec<ExpiryTask>>,
}

impl InMemoryExpiryQueue {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
        }
    }

    /// Enqueue a task.
    ///
    /// Called by the in-memory conversation store while it holds its own
    /// conversation lock, mirroring how the Postgres store inserts the
    /// task inside the take-over transaction.
    pub fn push(&self, task: ExpiryTask) {
        self.tasks
            .write()
            .expect("InMemoryExpiryQueue: tasks write lock poisoned")
            .push(task);
    }

    // === Test Helpers ===

    /// Snapshot of every task ever enqueued, in insertion order.
    pub fn tasks(&self) -> Vec<ExpiryTask> {
        self.tasks
            .read()
            .expect("InMemoryExpiryQueue: tasks lock poisoned")
            .clone()
    }

    /// Pending tasks only.
    pub fn pending_tasks(&self) -> Vec<ExpiryTask> {
        self.tasks()
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect()
    }

    fn update<F>(&self, id: &TaskId, apply: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut ExpiryTask),
    {
        let mut tasks = self
            .tasks
            .write()
            .expect("InMemoryExpiryQueue: tasks write lock poisoned");
        match tasks.iter_mut().find(|t| t.id == *id) {
            Some(task) => {
                apply(task);
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::TaskNotFound,
                format!("Expiry task not found: {}", id),
            )),
        }
    }
}

impl Default for InMemoryExpiryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpiryQueue for InMemoryExpiryQueue {
    async fn due(&self, now: Timestamp, limit: u32) -> Result<Vec<ExpiryTask>, DomainError> {
        let mut due: Vec<ExpiryTask> = self
            .tasks
            .read()
            .expect("InMemoryExpiryQueue: tasks lock poisoned")
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && !t.run_at.is_after(&now))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.run_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn complete(&self, id: &TaskId) -> Result<(), DomainError> {
        self.update(id, |task| task.mark_completed())
    }

    async fn postpone(&self, id: &TaskId, run_at: Timestamp, error: &str) -> Result<(), DomainError> {
        self.update(id, |task| task.mark_postponed(run_at, error))
    }

    async fn abandon(&self, id: &TaskId, error: &str) -> Result<(), DomainError> {
        self.update(id, |task| task.mark_abandoned(error))
    }
}
