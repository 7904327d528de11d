//! Control state: who is currently speaking for the tenant.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OperatorId, Timestamp, ValidationError};

/// Why a manual hold ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// An operator or tenant tooling handed control back explicitly.
    Manual,
    /// The hold passed its expiry and was reclaimed automatically.
    Timeout,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Timeout => "timeout",
        }
    }
}

/// An operator's temporary exclusive hold on a conversation.
///
/// The hold is the unit of hand-off: while it exists, the assistant stays
/// silent and only the holder may send outbound messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualHold {
    /// Operator holding control.
    holder: OperatorId,

    /// When control was taken. Identifies this hold against later ones
    /// on the same conversation.
    started_at: Timestamp,

    /// When the hold lapses unless released earlier.
    expires_at: Timestamp,
}

impl ManualHold {
    /// Create a hold. The expiry must be strictly after the start.
    pub fn new(
        holder: OperatorId,
        started_at: Timestamp,
        expires_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        if !expires_at.is_after(&started_at) {
            return Err(ValidationError::invalid_format(
                "expires_at",
                "must be strictly after started_at",
            ));
        }
        Ok(Self {
            holder,
            started_at,
            expires_at,
        })
    }

    pub fn holder(&self) -> &OperatorId {
        &self.holder
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// True once `now` has reached the expiry time.
    ///
    /// An expired hold still occupies the conversation until released;
    /// it only stops authorizing the holder to send.
    pub fn is_expired_at(&self, now: &Timestamp) -> bool {
        !now.is_before(&self.expires_at)
    }

    pub fn is_held_by(&self, operator: &OperatorId) -> bool {
        &self.holder == operator
    }

    /// A copy of this hold with a later expiry.
    pub fn extended_to(&self, new_expires_at: Timestamp) -> Result<Self, ValidationError> {
        Self::new(self.holder.clone(), self.started_at, new_expires_at)
    }
}

/// Whether the assistant or a human operator controls a conversation.
///
/// There is no state where hold data exists without a holder: either the
/// conversation is fully automated, or a complete [`ManualHold`] is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ControlState {
    /// The AI assistant replies on its own.
    Automated,
    /// A human operator has exclusive control.
    Manual(ManualHold),
}

impl ControlState {
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual(_))
    }

    /// The current hold, if any.
    pub fn as_manual(&self) -> Option<&ManualHold> {
        match self {
            Self::Manual(hold) => Some(hold),
            Self::Automated => None,
        }
    }
}
