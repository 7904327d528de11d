//! Foundation types shared across the domain.

pub mod errors;
pub mod events;
pub mod ids;
pub mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{
    domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent,
};
pub use ids::{ConversationId, MessageId, OperatorId, TaskId, TenantId};
pub use timestamp::Timestamp;
