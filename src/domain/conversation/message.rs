//! Messages exchanged within a conversation.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConversationId, MessageId, OperatorId, Timestamp, ValidationError,
};

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// The AI assistant.
    Ai,
    /// A human operator speaking during a manual hold.
    Operator,
    /// The customer on the external channel.
    Customer,
}

/// An append-only record of one message in a conversation.
///
/// Messages are never edited or deleted. Operator messages are only
/// recorded after the gateway accepted them, so `delivered` is always
/// true and `external_id` always present for that origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    conversation_id: ConversationId,
    origin: MessageOrigin,
    body: String,
    /// Operator who wrote the message. Present only for operator origin.
    authored_by: Option<OperatorId>,
    /// Whether the channel gateway accepted the message.
    delivered: bool,
    /// Identifier assigned by the channel gateway, when delivered.
    external_id: Option<String>,
    created_at: Timestamp,
}

impl Message {
    /// Record an operator message that the gateway already accepted.
    pub fn operator(
        conversation_id: ConversationId,
        authored_by: OperatorId,
        body: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(ValidationError::empty_field("body"));
        }
        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            origin: MessageOrigin::Operator,
            body,
            authored_by: Some(authored_by),
            delivered: true,
            external_id: Some(external_id.into()),
            created_at: Timestamp::now(),
        })
    }

    /// Record a reply produced by the assistant.
    pub fn automated(
        conversation_id: ConversationId,
        body: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(ValidationError::empty_field("body"));
        }
        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            origin: MessageOrigin::Ai,
            body,
            authored_by: None,
            delivered: false,
            external_id: None,
            created_at: Timestamp::now(),
        })
    }

    /// Record an inbound message from the customer.
    pub fn customer(
        conversation_id: ConversationId,
        body: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(ValidationError::empty_field("body"));
        }
        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            origin: MessageOrigin::Customer,
            body,
            authored_by: None,
            delivered: false,
            external_id: None,
            created_at: Timestamp::now(),
        })
    }

    /// Reconstitute from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: MessageId,
        conversation_id: ConversationId,
        origin: MessageOrigin,
        body: String,
        authored_by: Option<OperatorId>,
        delivered: bool,
        external_id: Option<String>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            conversation_id,
            origin,
            body,
            authored_by,
            delivered,
            external_id,
            created_at,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn origin(&self) -> MessageOrigin {
        self.origin
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn authored_by(&self) -> Option<&OperatorId> {
        self.authored_by.as_ref()
    }

    pub fn delivered(&self) -> bool {
        self.delivered
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }
}
