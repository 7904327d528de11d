//! Domain event infrastructure.
//!
//! Events record facts that already happened (control taken, control
//! released, operator message sent). They are published after state
//! changes commit and consumed by audit trails and tenant dashboards.
//! Publishing is fire-and-forget: a failed publish is logged, never
//! propagated back into the operation that produced the event.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::errors::{DomainError, ErrorCode};
use super::timestamp::Timestamp;

/// Unique identifier for a domain event instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Generate a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Behavior common to all domain events.
pub trait DomainEvent {
    /// Versioned event type, e.g. `"control.taken.v1"`.
    fn event_type(&self) -> &'static str;

    /// Schema version of the payload.
    fn schema_version(&self) -> u32;

    /// Identifier of the aggregate this event belongs to.
    fn aggregate_id(&self) -> String;

    /// Kind of aggregate, e.g. `"conversation"`.
    fn aggregate_type(&self) -> &'static str;

    /// When the event occurred.
    fn occurred_at(&self) -> Timestamp;

    /// Unique identifier of this event instance.
    fn event_id(&self) -> EventId;
}

/// Implements [`DomainEvent`] for an event struct.
///
/// The struct must have fields for the aggregate ID, the occurrence time,
/// and the event ID; the remaining attributes are compile-time constants.
#[macro_export]
macro_rules! domain_event {
    (
        $name:ident,
        event_type = $event_type:expr,
        schema_version = $schema_version:expr,
        aggregate_id = $aggregate_id:ident,
        aggregate_type = $aggregate_type:expr,
        occurred_at = $occurred_at:ident,
        event_id = $event_id:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn schema_version(&self) -> u32 {
                $schema_version
            }

            fn aggregate_id(&self) -> String {
                self.$aggregate_id.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                $aggregate_type
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_at
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id.clone()
            }
        }
    };
}

pub use domain_event;

/// Cross-cutting metadata attached to an event envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Groups events belonging to one logical operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// The event or command that directly caused this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,

    /// Operator who triggered the change, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,

    /// Distributed trace ID for observability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Transport wrapper around a serialized domain event.
///
/// The envelope is what crosses process boundaries: publishers serialize
/// it as JSON and subscribers deserialize the payload they care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: String,
    pub schema_version: u32,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub occurred_at: Timestamp,
    pub payload: JsonValue,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Build an envelope from raw parts.
    ///
    /// The schema version is parsed from the event type suffix
    /// (`"control.taken.v2"` gives 2) and defaults to 1.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        let schema_version = extract_version(&event_type);
        Self {
            event_id: EventId::new(),
            event_type,
            schema_version,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Build an envelope from a typed domain event.
    pub fn from_event<T: DomainEvent + Serialize + ?Sized>(event: &T) -> Result<Self, DomainError> {
        let payload = serde_json::to_value(event).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Failed to serialize event {}: {}", event.event_type(), e),
            )
        })?;
        Ok(Self {
            event_id: event.event_id(),
            event_type: event.event_type().to_string(),
            schema_version: event.schema_version(),
            aggregate_id: event.aggregate_id(),
            aggregate_type: event.aggregate_type().to_string(),
            occurred_at: event.occurred_at(),
            payload,
            metadata: EventMetadata::default(),
        })
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.causation_id = Some(id.into());
        self
    }

    pub fn with_operator_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.operator_id = Some(id.into());
        self
    }

    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.trace_id = Some(id.into());
        self
    }

    /// Deserialize the payload into a concrete event type.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, DomainError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Failed to deserialize payload of {}: {}", self.event_type, e),
            )
        })
    }

    /// A fixed envelope for adapter and worker tests.
    #[cfg(test)]
    pub fn test_fixture() -> Self {
        Self::new(
            "control.taken.v1",
            "b9c7a2e4-4f12-49da-9d0a-3f6f3a0c6b11",
            "conversation",
            serde_json::json!({
                "holder_id": "op-7f3a",
                "duration_minutes": 30
            }),
        )
    }
}

/// Extension trait turning any serializable event into an envelope.
pub trait SerializableDomainEvent: DomainEvent + Serialize {
    fn to_envelope(&self) -> Result<EventEnvelope, DomainError> {
        EventEnvelope::from_event(self)
    }
}

impl<T: DomainEvent + Serialize> SerializableDomainEvent for T {}

fn extract_version(event_type: &str) -> u32 {
    event_type
        .rsplit_once(".v")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(1)
}
