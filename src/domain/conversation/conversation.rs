//! Conversation aggregate.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ConversationId, DomainError, ErrorCode, Timestamp, TenantId, ValidationError,
};

use super::control::{ControlState, ManualHold};

/// Address of the customer on the external messaging channel.
///
/// Opaque to the coordinator; the channel gateway knows how to route it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelAddress(String);

impl ChannelAddress {
    pub fn new(address: impl Into<String>) -> Result<Self, ValidationError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(ValidationError::empty_field("channel_address"));
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A customer conversation and who currently controls it.
///
/// The aggregate owns the control state machine: automated by default,
/// manual while exactly one operator holds it. Transitions that would
/// break that shape are rejected with typed errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    id: ConversationId,

    /// Tenant the conversation belongs to. All access is scoped by it.
    tenant_id: TenantId,

    /// Customer address on the messaging channel, when known.
    channel: Option<ChannelAddress>,

    /// Current control state.
    control: ControlState,

    /// When the conversation was created.
    created_at: Timestamp,

    /// Last modification time.
    updated_at: Timestamp,
}

impl Conversation {
    /// Create a new conversation under automated control.
    pub fn new(tenant_id: TenantId, channel: Option<ChannelAddress>) -> Self {
        let now = Timestamp::now();
        Self {
            id: ConversationId::new(),
            tenant_id,
            channel,
            control: ControlState::Automated,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitute from persistence (no validation, no events).
    pub fn reconstitute(
        id: ConversationId,
        tenant_id: TenantId,
        channel: Option<ChannelAddress>,
        control: ControlState,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            tenant_id,
            channel,
            control,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn channel(&self) -> Option<&ChannelAddress> {
        self.channel.as_ref()
    }

    pub fn control(&self) -> &ControlState {
        &self.control
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Control transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Place the conversation under manual control.
    ///
    /// Fails if another hold is already in place, even an expired one:
    /// expired holds end through release, never by being overwritten.
    pub fn begin_manual(&mut self, hold: ManualHold) -> Result<(), DomainError> {
        if let ControlState::Manual(existing) = &self.control {
            return Err(DomainError::new(
                ErrorCode::AlreadyInManualMode,
                format!("Conversation {} is already under manual control", self.id),
            )
            .with_detail("holder_id", existing.holder().as_str()));
        }
        self.control = ControlState::Manual(hold);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Return the conversation to automated control.
    ///
    /// Returns the hold that just ended so callers can audit it.
    pub fn end_manual(&mut self) -> Result<ManualHold, DomainError> {
        match std::mem::replace(&mut self.control, ControlState::Automated) {
            ControlState::Manual(hold) => {
                self.updated_at = Timestamp::now();
                Ok(hold)
            }
            ControlState::Automated => Err(DomainError::new(
                ErrorCode::NotInManualMode,
                format!("Conversation {} is not under manual control", self.id),
            )),
        }
    }

    /// Push the current hold's expiry to a later time.
    ///
    /// Returns the previous expiry.
    pub fn extend_manual(&mut self, new_expires_at: Timestamp) -> Result<Timestamp, DomainError> {
        match &self.control {
            ControlState::Manual(hold) => {
                let previous = hold.expires_at();
                let extended = hold.extended_to(new_expires_at)?;
                self.control = ControlState::Manual(extended);
                self.updated_at = Timestamp::now();
                Ok(previous)
            }
            ControlState::Automated => Err(DomainError::new(
                ErrorCode::NotInManualMode,
                format!("Conversation {} is not under manual control", self.id),
            )),
        }
    }
}
