//! Redis-backed event publisher for production deployments.
//!
//! Fans audit events out over Redis pub/sub so tenant dashboards and
//! other processes can follow hand-offs live. Publishing is fire-and-
//! forget from the caller's perspective: command handlers already treat
//! event publishing as best-effort.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// Redis pub/sub event publisher.
///
/// Each event type gets its own channel under a common prefix, so a
/// consumer can PSUBSCRIBE to `tandem.events.*` or pick single types.
#[derive(Clone)]
pub struct RedisEventPublisher {
    conn: MultiplexedConnection,
    channel_prefix: String,
}

impl RedisEventPublisher {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            channel_prefix: "tandem.events".to_string(),
        }
    }

    /// Override the channel prefix (for namespacing shared Redis instances).
    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }

    fn channel_for(&self, event_type: &str) -> String {
        format!("{}.{}", self.channel_prefix, event_type)
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let payload = serde_json::to_string(&event).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Failed to serialize event {}: {}", event.event_type, e),
            )
        })?;
        let channel = self.channel_for(&event.event_type);

        let mut conn = self.conn.clone();
        conn.publish::<_, _, i64>(&channel, payload)
            .await
            .map_err(|e: redis::RedisError| {
                DomainError::new(
                    ErrorCode::CacheError,
                    format!("Failed to publish {} to Redis: {}", event.event_type, e),
                )
            })?;

        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RedisEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventPublisher")
            .field("channel_prefix", &self.channel_prefix)
            .finish_non_exhaustive()
    }
}
