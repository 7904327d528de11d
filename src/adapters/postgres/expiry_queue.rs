//! PostgreSQL implementation of ExpiryQueue.
//!
//! Tasks are inserted by `PostgresConversationStore::begin_hold` inside
//! the take-over transaction; this adapter only polls and settles them.
//! The queue assumes a single worker process. Running several would make
//! workers race for the same tasks; the staleness checks downstream keep
//! that harmless but wasteful.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{
    ConversationId, DomainError, ErrorCode, TaskId, TenantId, Timestamp,
};
use crate::ports::{ExpiryQueue, ExpiryTask, TaskStatus};

/// PostgreSQL implementation of ExpiryQueue.
#[derive(Clone)]
pub struct PostgresExpiryQueue {
    pool: PgPool,
}

impl PostgresExpiryQueue {
    /// Creates a new PostgresExpiryQueue.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpiryQueue for PostgresExpiryQueue {
    async fn due(&self, now: Timestamp, limit: u32) -> Result<Vec<ExpiryTask>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, conversation_id, expected_control_started_at,
                   run_at, status, attempts, last_error, created_at
            FROM control_expiry_tasks
            WHERE status = 'pending' AND run_at <= $1
            ORDER BY run_at ASC
            LIMIT $2
            "#,
        )
        .bind(now.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch due tasks: {}", e),
            )
        })?;

        rows.into_iter().map(row_to_task).collect()
    }

    async fn complete(&self, id: &TaskId) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE control_expiry_tasks SET
                status = $2,
                attempts = attempts + 1
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(task_status_to_str(TaskStatus::Completed))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to complete task: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::TaskNotFound,
                format!("Expiry task not found: {}", id),
            ));
        }

        Ok(())
    }

    async fn postpone(&self, id: &TaskId, run_at: Timestamp, error: &str) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE control_expiry_tasks SET
                run_at = $2,
                attempts = attempts + 1,
                last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(run_at.as_datetime())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to postpone task: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::TaskNotFound,
                format!("Expiry task not found: {}", id),
            ));
        }

        Ok(())
    }

    async fn abandon(&self, id: &TaskId, error: &str) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE control_expiry_tasks SET
                status = $3,
                attempts = attempts + 1,
                last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .bind(task_status_to_str(TaskStatus::Abandoned))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to abandon task: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::TaskNotFound,
                format!("Expiry task not found: {}", id),
            ));
        }

        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn str_to_task_status(s: &str) -> Result<TaskStatus, DomainError> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "completed" => Ok(TaskStatus::Completed),
        "abandoned" => Ok(TaskStatus::Abandoned),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid task status: {}", s),
        )),
    }
}

fn task_status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Completed => "completed",
        TaskStatus::Abandoned => "abandoned",
    }
}

fn row_to_task(row: sqlx::postgres::PgRow) -> Result<ExpiryTask, DomainError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Failed to get id: {}", e))
    })?;

    let tenant_id: uuid::Uuid = row.try_get("tenant_id").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get tenant_id: {}", e),
        )
    })?;

    let conversation_id: uuid::Uuid = row.try_get("conversation_id").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get conversation_id: {}", e),
        )
    })?;

    let expected_control_started_at: chrono::DateTime<chrono::Utc> =
        row.try_get("expected_control_started_at").map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to get expected_control_started_at: {}", e),
            )
        })?;

    let run_at: chrono::DateTime<chrono::Utc> = row.try_get("run_at").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get run_at: {}", e),
        )
    })?;

    let status_str: String = row.try_get("status").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get status: {}", e),
        )
    })?;
    let status = str_to_task_status(&status_str)?;

    let attempts: i32 = row.try_get("attempts").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get attempts: {}", e),
        )
    })?;
    let attempts = u32::try_from(attempts).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid attempts count: {}", e),
        )
    })?;

    let last_error: Option<String> = row.try_get("last_error").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get last_error: {}", e),
        )
    })?;

    let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get created_at: {}", e),
        )
    })?;

    Ok(ExpiryTask {
        id: TaskId::from_uuid(id),
        tenant_id: TenantId::from_uuid(tenant_id),
        conversation_id: ConversationId::from_uuid(conversation_id),
        expected_control_started_at: Timestamp::from_datetime(expected_control_started_at),
        run_at: Timestamp::from_datetime(run_at),
        status,
        attempts,
        last_error,
        created_at: Timestamp::from_datetime(created_at),
    })
}
