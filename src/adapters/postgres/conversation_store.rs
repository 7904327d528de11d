//! PostgreSQL implementation of ConversationStore.
//!
//! Persists conversations and their control state. Take-over serializes
//! concurrent attempts through a row lock (`SELECT ... FOR UPDATE`);
//! release and extension are single conditional UPDATEs, so the state
//! check and the write are one atomic statement.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::conversation::{ChannelAddress, ControlState, Conversation, ManualHold};
use crate::domain::foundation::{
    ConversationId, DomainError, ErrorCode, OperatorId, TenantId, Timestamp,
};
use crate::ports::{BeginHold, ConversationStore, EndHold, ExpiryTask, ExtendHold, TaskStatus};

/// PostgreSQL implementation of ConversationStore.
#[derive(Clone)]
pub struct PostgresConversationStore {
    pool: PgPool,
}

impl PostgresConversationStore {
    /// Creates a new PostgresConversationStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PostgresConversationStore {
    async fn find(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, channel_address, control_mode, holder_id,
                   control_started_at, control_expires_at, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch conversation: {}", e),
            )
        })?;

        match row {
            Some(row) => Ok(Some(row_to_conversation(row)?)),
            None => Ok(None),
        }
    }

    async fn begin_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        hold: ManualHold,
    ) -> Result<BeginHold, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to begin transaction: {}", e),
            )
        })?;

        // Row lock: concurrent take-over attempts on this conversation
        // queue up here, and losers see the winner's hold.
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, channel_address, control_mode, holder_id,
                   control_started_at, control_expires_at, created_at, updated_at
            FROM conversations
            WHERE id = $1 AND tenant_id = $2
            FOR UPDATE
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to lock conversation: {}", e),
            )
        })?;

        let Some(row) = row else {
            return Ok(BeginHold::NotFound);
        };

        let mut conversation = row_to_conversation(row)?;
        if let Some(existing) = conversation.control().as_manual() {
            return Ok(BeginHold::AlreadyManual {
                holder: existing.holder().clone(),
            });
        }

        conversation.begin_manual(hold.clone())?;

        sqlx::query(
            r#"
            UPDATE conversations SET
                control_mode = $3,
                holder_id = $4,
                control_started_at = $5,
                control_expires_at = $6,
                updated_at = $7
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(control_mode_to_str(conversation.control()))
        .bind(hold.holder().as_str())
        .bind(hold.started_at().as_datetime())
        .bind(hold.expires_at().as_datetime())
        .bind(conversation.updated_at().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to write hold: {}", e),
            )
        })?;

        // Same transaction as the hold write; neither lands without the other.
        let task = ExpiryTask::for_hold(*tenant_id, *conversation_id, &hold);
        sqlx::query(
            r#"
            INSERT INTO control_expiry_tasks (
                id, tenant_id, conversation_id, expected_control_started_at,
                run_at, status, attempts, last_error, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(task.id.as_uuid())
        .bind(task.tenant_id.as_uuid())
        .bind(task.conversation_id.as_uuid())
        .bind(task.expected_control_started_at.as_datetime())
        .bind(task.run_at.as_datetime())
        .bind(task_status_to_str(task.status))
        .bind(task.attempts as i32)
        .bind(task.last_error.as_deref())
        .bind(task.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to schedule expiry check: {}", e),
            )
        })?;

        tx.commit().await.map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to commit transaction: {}", e),
            )
        })?;

        Ok(BeginHold::Granted(conversation))
    }

    async fn end_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        expected_started_at: Timestamp,
    ) -> Result<EndHold, DomainError> {
        let now = Timestamp::now();
        let result = sqlx::query(
            r#"
            UPDATE conversations SET
                control_mode = 'automated',
                holder_id = NULL,
                control_started_at = NULL,
                control_expires_at = NULL,
                updated_at = $4
            WHERE id = $1 AND tenant_id = $2
              AND control_mode = 'manual'
              AND control_started_at = $3
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(expected_started_at.as_datetime())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to clear hold: {}", e),
            )
        })?;

        if result.rows_affected() == 1 {
            return Ok(EndHold::Ended);
        }

        // Nothing matched; look at the live mode to say why.
        let mode: Option<String> = sqlx::query_scalar(
            r#"
            SELECT control_mode FROM conversations
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch control mode: {}", e),
            )
        })?;

        match mode.as_deref() {
            Some("manual") => Ok(EndHold::Superseded),
            _ => Ok(EndHold::NotManual),
        }
    }

    async fn extend_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        holder: &OperatorId,
        new_expires_at: Timestamp,
    ) -> Result<ExtendHold, DomainError> {
        let now = Timestamp::now();
        let result = sqlx::query(
            r#"
            UPDATE conversations SET
                control_expires_at = $4,
                updated_at = $5
            WHERE id = $1 AND tenant_id = $2
              AND control_mode = 'manual'
              AND holder_id = $3
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(holder.as_str())
        .bind(new_expires_at.as_datetime())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to extend hold: {}", e),
            )
        })?;

        if result.rows_affected() == 1 {
            Ok(ExtendHold::Extended)
        } else {
            Ok(ExtendHold::NotHeld)
        }
    }

    async fn insert(&self, conversation: &Conversation) -> Result<(), DomainError> {
        let hold = conversation.control().as_manual();
        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, tenant_id, channel_address, control_mode, holder_id,
                control_started_at, control_expires_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(conversation.id().as_uuid())
        .bind(conversation.tenant_id().as_uuid())
        .bind(conversation.channel().map(|c| c.as_str()))
        .bind(control_mode_to_str(conversation.control()))
        .bind(hold.map(|h| h.holder().as_str()))
        .bind(hold.map(|h| *h.started_at().as_datetime()))
        .bind(hold.map(|h| *h.expires_at().as_datetime()))
        .bind(conversation.created_at().as_datetime())
        .bind(conversation.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert conversation: {}", e),
            )
        })?;

        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn control_mode_to_str(control: &ControlState) -> &'static str {
    match control {
        ControlState::Automated => "automated",
        ControlState::Manual(_) => "manual",
    }
}

fn control_from_columns(
    mode: &str,
    holder_id: Option<String>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<ControlState, DomainError> {
    match mode {
        "automated" => Ok(ControlState::Automated),
        "manual" => {
            let holder_id = holder_id.ok_or_else(|| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    "Manual conversation row has no holder_id".to_string(),
                )
            })?;
            let started_at = started_at.ok_or_else(|| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    "Manual conversation row has no control_started_at".to_string(),
                )
            })?;
            let expires_at = expires_at.ok_or_else(|| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    "Manual conversation row has no control_expires_at".to_string(),
                )
            })?;

            let holder = OperatorId::new(holder_id).map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid holder_id: {}", e),
                )
            })?;
            let hold = ManualHold::new(
                holder,
                Timestamp::from_datetime(started_at),
                Timestamp::from_datetime(expires_at),
            )
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Invalid control hold: {}", e),
                )
            })?;
            Ok(ControlState::Manual(hold))
        }
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid control mode: {}", mode),
        )),
    }
}

fn row_to_conversation(row: sqlx::postgres::PgRow) -> Result<Conversation, DomainError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Failed to get id: {}", e))
    })?;

    let tenant_id: uuid::Uuid = row.try_get("tenant_id").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get tenant_id: {}", e),
        )
    })?;

    let channel_address: Option<String> = row.try_get("channel_address").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get channel_address: {}", e),
        )
    })?;

    let control_mode: String = row.try_get("control_mode").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get control_mode: {}", e),
        )
    })?;

    let holder_id: Option<String> = row.try_get("holder_id").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get holder_id: {}", e),
        )
    })?;

    let control_started_at: Option<chrono::DateTime<chrono::Utc>> =
        row.try_get("control_started_at").map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to get control_started_at: {}", e),
            )
        })?;

    let control_expires_at: Option<chrono::DateTime<chrono::Utc>> =
        row.try_get("control_expires_at").map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to get control_expires_at: {}", e),
            )
        })?;

    let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get created_at: {}", e),
        )
    })?;

    let updated_at: chrono::DateTime<chrono::Utc> = row.try_get("updated_at").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get updated_at: {}", e),
        )
    })?;

    let channel = channel_address
        .map(ChannelAddress::new)
        .transpose()
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid channel_address: {}", e),
            )
        })?;

    let control = control_from_columns(
        &control_mode,
        holder_id,
        control_started_at,
        control_expires_at,
    )?;

    Ok(Conversation::reconstitute(
        ConversationId::from_uuid(id),
        TenantId::from_uuid(tenant_id),
        channel,
        control,
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}

fn task_status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Completed => "completed",
        TaskStatus::Abandoned => "abandoned",
    }
}
