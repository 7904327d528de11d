//! ExpireControl command handler.
//!
//! Runs when a scheduled expiry check fires. The task only proves that a
//! hold existed when it was scheduled; the live conversation decides
//! what happens. Most outcomes are quiet no-ops, because the hold the
//! task was scheduled for may have been released, replaced, or extended
//! since.
//!
//! Every `Ok` outcome is terminal for the task. Only a store failure is
//! an `Err`, which tells the worker to retry later.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::conversation::ReleaseReason;
use crate::domain::foundation::{
    ConversationId, DomainError, OperatorId, TenantId, Timestamp,
};
use crate::ports::{ConversationStore, DeliveryGateway, EventPublisher, ExpiryTask};

use super::release_control::{ReleaseControlCommand, ReleaseControlError, ReleaseControlHandler};
use super::HandoffPolicy;

/// Command to run one scheduled expiry check.
#[derive(Debug, Clone)]
pub struct ExpireControlCommand {
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    /// Start time of the hold this check was scheduled for. A hold
    /// with a different start time is a newer hold and stays untouched.
    pub expected_control_started_at: Timestamp,
}

impl ExpireControlCommand {
    pub fn new(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        expected_control_started_at: Timestamp,
    ) -> Self {
        Self {
            tenant_id,
            conversation_id,
            expected_control_started_at,
        }
    }

    pub fn from_task(task: &ExpiryTask) -> Self {
        Self {
            tenant_id: task.tenant_id,
            conversation_id: task.conversation_id,
            expected_control_started_at: task.expected_control_started_at,
        }
    }
}

/// What the expiry check found.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpireControlOutcome {
    /// The hold had lapsed and control went back to the assistant.
    Released {
        holder_id: OperatorId,
        held_minutes: i64,
    },
    /// The conversation no longer exists.
    ConversationGone,
    /// Control is already automated; nothing to reclaim.
    AlreadyAutomated,
    /// A different hold than the one this check was scheduled for.
    StaleHold,
    /// The hold was extended past this check's horizon.
    NotYetExpired { expires_at: Timestamp },
}

/// Errors that abort an expiry check.
#[derive(Debug, Clone, Error)]
pub enum ExpireControlError {
    /// Store error; the check can be retried.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl From<DomainError> for ExpireControlError {
    fn from(err: DomainError) -> Self {
        ExpireControlError::StoreError(err.to_string())
    }
}

/// Handler for ExpireControl commands.
pub struct ExpireControlHandler<S, G, P>
where
    S: ConversationStore,
    G: DeliveryGateway,
    P: EventPublisher,
{
    store: Arc<S>,
    release: ReleaseControlHandler<S, G, P>,
}

impl<S, G, P> ExpireControlHandler<S, G, P>
where
    S: ConversationStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, events: Arc<P>, policy: HandoffPolicy) -> Self {
        Self {
            store: Arc::clone(&store),
            release: ReleaseControlHandler::new(store, gateway, events, policy),
        }
    }

    /// Handles one expiry check.
    pub async fn handle(
        &self,
        cmd: ExpireControlCommand,
    ) -> Result<ExpireControlOutcome, ExpireControlError> {
        let conversation = match self
            .store
            .find(&cmd.tenant_id, &cmd.conversation_id)
            .await?
        {
            Some(conversation) => conversation,
            None => return Ok(ExpireControlOutcome::ConversationGone),
        };

        let hold = match conversation.control().as_manual() {
            Some(hold) => hold,
            None => return Ok(ExpireControlOutcome::AlreadyAutomated),
        };

        if hold.started_at() != cmd.expected_control_started_at {
            return Ok(ExpireControlOutcome::StaleHold);
        }

        if !hold.is_expired_at(&Timestamp::now()) {
            return Ok(ExpireControlOutcome::NotYetExpired {
                expires_at: hold.expires_at(),
            });
        }

        let release_cmd = ReleaseControlCommand::by_system(
            cmd.tenant_id,
            cmd.conversation_id,
            ReleaseReason::Timeout,
        );
        match self.release.handle(release_cmd).await {
            Ok(released) => Ok(ExpireControlOutcome::Released {
                holder_id: released.holder_id,
                held_minutes: released.held_minutes,
            }),
            // Races with a concurrent release or take-over all resolve
            // to the same quiet no-ops as the pre-checks above.
            Err(ReleaseControlError::NotManual) => Ok(ExpireControlOutcome::AlreadyAutomated),
            Err(ReleaseControlError::HoldChanged) => Ok(ExpireControlOutcome::StaleHold),
            Err(ReleaseControlError::ConversationNotFound(_)) => {
                Ok(ExpireControlOutcome::ConversationGone)
            }
            // System releases skip the holder check; kept for match completeness.
            Err(ReleaseControlError::NotHolder { .. }) => Ok(ExpireControlOutcome::StaleHold),
            Err(ReleaseControlError::StoreError(e)) => Err(ExpireControlError::StoreError(e)),
        }
    }
}
