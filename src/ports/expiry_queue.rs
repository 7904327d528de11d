//! ExpiryQueue port - Scheduled checks that reclaim lapsed manual holds.
//!
//! A task is created together with every hold (inside the same atomic
//! unit, see `ConversationStore::begin_hold`) and fires at the hold's
//! original expiry time. Delivery is at-least-once: a worker crash after
//! processing but before `complete` re-fires the task, and the staleness
//! checks downstream make the re-fire harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ManualHold;
use crate::domain::foundation::{ConversationId, DomainError, TaskId, TenantId, Timestamp};

/// Status of a scheduled expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to run (or to be retried).
    Pending,
    /// Processed; the task is consumed regardless of what it found.
    Completed,
    /// Given up after repeated transient failures.
    Abandoned,
}

/// A scheduled check that a specific manual hold has been dealt with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryTask {
    /// Unique identifier for this task.
    pub id: TaskId,

    /// Tenant owning the conversation.
    pub tenant_id: TenantId,

    /// Conversation whose hold is being guarded.
    pub conversation_id: ConversationId,

    /// Start time of the hold this task was created for. A different
    /// value on the live conversation means a newer hold is in place and
    /// this task is stale.
    pub expected_control_started_at: Timestamp,

    /// When the task becomes due.
    pub run_at: Timestamp,

    /// Current status.
    pub status: TaskStatus,

    /// Number of processing attempts so far.
    pub attempts: u32,

    /// Last error message if an attempt failed.
    pub last_error: Option<String>,

    /// When the task was created.
    pub created_at: Timestamp,
}

impl ExpiryTask {
    /// Create the expiry check for a newly placed hold.
    ///
    /// Due at the hold's expiry, guarding the hold's start time.
    pub fn for_hold(tenant_id: TenantId, conversation_id: ConversationId, hold: &ManualHold) -> Self {
        Self {
            id: TaskId::new(),
            tenant_id,
            conversation_id,
            expected_control_started_at: hold.started_at(),
            run_at: hold.expires_at(),
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Timestamp::now(),
        }
    }

    /// Consume the task after its outcome is settled.
    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.attempts += 1;
    }

    /// Record a failed attempt and push the next one to `run_at`.
    pub fn mark_postponed(&mut self, run_at: Timestamp, error: impl Into<String>) {
        self.run_at = run_at;
        self.attempts += 1;
        self.last_error = Some(error.into());
    }

    /// Give up on the task.
    pub fn mark_abandoned(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Abandoned;
        self.attempts += 1;
        self.last_error = Some(error.into());
    }
}

/// Port for the expiry task queue.
#[async_trait]
pub trait ExpiryQueue: Send + Sync {
    /// Pending tasks whose run time has passed, oldest first.
    async fn due(&self, now: Timestamp, limit: u32) -> Result<Vec<ExpiryTask>, DomainError>;

    /// Consume a task. Structural no-ops (stale, already released) count
    /// as success and consume the task too.
    async fn complete(&self, id: &TaskId) -> Result<(), DomainError>;

    /// Record a transient failure and schedule the next attempt.
    async fn postpone(&self, id: &TaskId, run_at: Timestamp, error: &str) -> Result<(), DomainError>;

    /// Drop a task that keeps failing.
    async fn abandon(&self, id: &TaskId, error: &str) -> Result<(), DomainError>;
}
