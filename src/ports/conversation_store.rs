//! ConversationStore port - Persistence for conversations and their
//! control state.
//!
//! Contracts every implementation must honor:
//! - All lookups are scoped by tenant. A conversation is never visible
//!   outside the tenant it belongs to.
//! - `begin_hold` is the concurrency arbiter: for any one conversation,
//!   concurrent calls are serialized and at most one returns `Granted`.
//! - `begin_hold` records the hold and schedules its expiry check as a
//!   single atomic unit. Neither effect happens without the other.
//! - `end_hold` and `extend_hold` are conditional updates: the state
//!   check and the write happen in one atomic step, never read-then-write.

use async_trait::async_trait;

use crate::domain::conversation::{Conversation, ManualHold};
use crate::domain::foundation::{ConversationId, DomainError, OperatorId, TenantId, Timestamp};

/// Outcome of attempting to place a manual hold.
#[derive(Debug, Clone, PartialEq)]
pub enum BeginHold {
    /// The hold is in place and its expiry check is scheduled.
    /// Carries the updated conversation.
    Granted(Conversation),
    /// Someone already holds the conversation.
    AlreadyManual { holder: OperatorId },
    /// No such conversation in this tenant.
    NotFound,
}

/// Outcome of a conditional release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndHold {
    /// The expected hold was cleared; the conversation is automated again.
    Ended,
    /// The conversation was already automated.
    NotManual,
    /// A hold exists but it is not the one the caller expected.
    Superseded,
}

/// Outcome of a conditional extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendHold {
    /// The expiry was moved forward.
    Extended,
    /// The operator no longer holds the conversation.
    NotHeld,
}

/// Port for conversation persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load a conversation by tenant and ID.
    async fn find(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, DomainError>;

    /// Place `hold` on an automated conversation.
    ///
    /// Writing the hold and scheduling its expiry check form one atomic
    /// unit. Concurrent calls for the same conversation are serialized;
    /// losers observe `AlreadyManual`.
    async fn begin_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        hold: ManualHold,
    ) -> Result<BeginHold, DomainError>;

    /// Clear the hold whose start time is `expected_started_at`.
    ///
    /// Applies only while the conversation is manual and the live hold
    /// started at exactly the expected time; otherwise the state is left
    /// untouched and the mismatch is reported.
    async fn end_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        expected_started_at: Timestamp,
    ) -> Result<EndHold, DomainError>;

    /// Move the live hold's expiry to `new_expires_at`.
    ///
    /// Applies only while `holder` still holds the conversation. The
    /// expiry check scheduled at take-over is NOT rescheduled; it fires
    /// at the original time and no-ops against the later expiry.
    async fn extend_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        holder: &OperatorId,
        new_expires_at: Timestamp,
    ) -> Result<ExtendHold, DomainError>;

    /// Insert a new conversation.
    ///
    /// Used by platform ingestion and test seeding; hand-off operations
    /// only ever read and update.
    async fn insert(&self, conversation: &Conversation) -> Result<(), DomainError>;
}
