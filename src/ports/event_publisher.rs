//! EventPublisher port - Interface for publishing audit events.
//!
//! This port defines how the coordinator publishes hand-off events
//! without knowing about the underlying transport (in-memory, Redis).

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Implementations must ensure:
/// - Events are delivered at-least-once (consumers may receive duplicates)
/// - Errors are propagated to the caller; the caller decides whether a
///   failed publish is fatal (for hand-off operations it never is)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish multiple events.
    ///
    /// Adapters without transactional publishing send sequentially with
    /// best-effort delivery.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}
