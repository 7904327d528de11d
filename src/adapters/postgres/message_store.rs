//! PostgreSQL implementation of MessageStore.
//!
//! The message log is append-only; rows are never updated or deleted.
//! Appending a message does not touch the conversation row, so the
//! transcript and the control state never contend for the same lock.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::conversation::{Message, MessageOrigin};
use crate::domain::foundation::{
    ConversationId, DomainError, ErrorCode, MessageId, OperatorId, Timestamp,
};
use crate::ports::MessageStore;

/// PostgreSQL implementation of MessageStore.
#[derive(Clone)]
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Creates a new PostgresMessageStore.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn append(&self, message: &Message) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO messages (
                id, conversation_id, origin, body, authored_by,
                delivered, external_id, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(message.id().as_uuid())
        .bind(message.conversation_id().as_uuid())
        .bind(origin_to_str(message.origin()))
        .bind(message.body())
        .bind(message.authored_by().map(|op| op.as_str()))
        .bind(message.delivered())
        .bind(message.external_id())
        .bind(message.created_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to insert message: {}", e),
            )
        })?;

        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, origin, body, authored_by,
                   delivered, external_id, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to fetch messages: {}", e),
            )
        })?;

        rows.into_iter().map(row_to_message).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Helper functions
// ════════════════════════════════════════════════════════════════════════════

fn origin_to_str(origin: MessageOrigin) -> &'static str {
    match origin {
        MessageOrigin::Ai => "ai",
        MessageOrigin::Operator => "operator",
        MessageOrigin::Customer => "customer",
    }
}

fn str_to_origin(s: &str) -> Result<MessageOrigin, DomainError> {
    match s {
        "ai" => Ok(MessageOrigin::Ai),
        "operator" => Ok(MessageOrigin::Operator),
        "customer" => Ok(MessageOrigin::Customer),
        _ => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid message origin: {}", s),
        )),
    }
}

fn row_to_message(row: sqlx::postgres::PgRow) -> Result<Message, DomainError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| {
        DomainError::new(ErrorCode::DatabaseError, format!("Failed to get id: {}", e))
    })?;

    let conversation_id: uuid::Uuid = row.try_get("conversation_id").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get conversation_id: {}", e),
        )
    })?;

    let origin_str: String = row.try_get("origin").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get origin: {}", e),
        )
    })?;
    let origin = str_to_origin(&origin_str)?;

    let body: String = row.try_get("body").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get body: {}", e),
        )
    })?;

    let authored_by: Option<String> = row.try_get("authored_by").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get authored_by: {}", e),
        )
    })?;
    let authored_by = authored_by
        .map(OperatorId::new)
        .transpose()
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid authored_by: {}", e),
            )
        })?;

    let delivered: bool = row.try_get("delivered").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get delivered: {}", e),
        )
    })?;

    let external_id: Option<String> = row.try_get("external_id").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get external_id: {}", e),
        )
    })?;

    let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at").map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to get created_at: {}", e),
        )
    })?;

    Ok(Message::reconstitute(
        MessageId::from_uuid(id),
        ConversationId::from_uuid(conversation_id),
        origin,
        body,
        authored_by,
        delivered,
        external_id,
        Timestamp::from_datetime(created_at),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_conversion_roundtrips() {
        for origin in [
            MessageOrigin::Ai,
            MessageOrigin::Operator,
            MessageOrigin::Customer,
        ] {
            assert_eq!(str_to_origin(origin_to_str(origin)).unwrap(), origin);
        }
    }

    #[test]
    fn str_to_origin_rejects_invalid() {
        assert!(str_to_origin("bot").is_err());
    }
}
