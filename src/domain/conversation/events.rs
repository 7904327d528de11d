//! Domain events emitted by control hand-offs.
//!
//! These feed the tenant-facing audit trail. Consumers subscribe through
//! the event publisher port and must tolerate duplicates.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    domain_event, ConversationId, EventId, MessageId, OperatorId, Timestamp, TenantId,
};

use super::control::ReleaseReason;

/// A human operator took manual control of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlTaken {
    pub event_id: EventId,
    pub conversation_id: ConversationId,
    pub tenant_id: TenantId,
    pub holder_id: OperatorId,
    pub control_started_at: Timestamp,
    pub control_expires_at: Timestamp,
    pub occurred_at: Timestamp,
}

impl ControlTaken {
    pub fn new(
        conversation_id: ConversationId,
        tenant_id: TenantId,
        holder_id: OperatorId,
        control_started_at: Timestamp,
        control_expires_at: Timestamp,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            conversation_id,
            tenant_id,
            holder_id,
            control_started_at,
            control_expires_at,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    ControlTaken,
    event_type = "control.taken.v1",
    schema_version = 1,
    aggregate_id = conversation_id,
    aggregate_type = "conversation",
    occurred_at = occurred_at,
    event_id = event_id
);

/// A conversation returned to automated control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReleased {
    pub event_id: EventId,
    pub conversation_id: ConversationId,
    pub tenant_id: TenantId,
    /// Operator who held control when it was released.
    pub holder_id: OperatorId,
    /// Operator who requested the release; `None` for system-initiated
    /// releases such as expiry.
    pub released_by: Option<OperatorId>,
    pub reason: ReleaseReason,
    /// How long the hold lasted, in whole minutes.
    pub held_minutes: i64,
    pub occurred_at: Timestamp,
}

impl ControlReleased {
    pub fn new(
        conversation_id: ConversationId,
        tenant_id: TenantId,
        holder_id: OperatorId,
        released_by: Option<OperatorId>,
        reason: ReleaseReason,
        held_minutes: i64,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            conversation_id,
            tenant_id,
            holder_id,
            released_by,
            reason,
            held_minutes,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    ControlReleased,
    event_type = "control.released.v1",
    schema_version = 1,
    aggregate_id = conversation_id,
    aggregate_type = "conversation",
    occurred_at = occurred_at,
    event_id = event_id
);

/// An operator message was delivered to the customer and recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorMessageSent {
    pub event_id: EventId,
    pub conversation_id: ConversationId,
    pub tenant_id: TenantId,
    pub operator_id: OperatorId,
    pub message_id: MessageId,
    /// Identifier the channel gateway assigned on delivery.
    pub external_message_id: String,
    /// Whether sending also pushed the hold's expiry forward.
    pub extended_hold: bool,
    pub occurred_at: Timestamp,
}

impl OperatorMessageSent {
    pub fn new(
        conversation_id: ConversationId,
        tenant_id: TenantId,
        operator_id: OperatorId,
        message_id: MessageId,
        external_message_id: impl Into<String>,
        extended_hold: bool,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            conversation_id,
            tenant_id,
            operator_id,
            message_id,
            external_message_id: external_message_id.into(),
            extended_hold,
            occurred_at: Timestamp::now(),
        }
    }
}

domain_event!(
    OperatorMessageSent,
    event_type = "operator_message.sent.v1",
    schema_version = 1,
    aggregate_id = conversation_id,
    aggregate_type = "conversation",
    occurred_at = occurred_at,
    event_id = event_id
);
