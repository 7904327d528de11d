//! ReleaseControl command handler.
//!
//! Returns a conversation to automated control. Callers are operators
//! handing back explicitly, tenant tooling acting on their behalf, or
//! the expiry worker reclaiming a lapsed hold (a system release).
//!
//! The resume notice is sent while the conversation is still manual per
//! our read, without re-locking; the clear itself is a conditional
//! update keyed on the hold's start time, so a hold that changed in
//! between is never evicted by mistake.

use std::sync::Arc;
use thiserror::Error;

use crate::application::messaging::MessageSender;
use crate::domain::conversation::{ControlReleased, ReleaseReason};
use crate::domain::foundation::{
    ConversationId, DomainError, OperatorId, SerializableDomainEvent, TenantId, Timestamp,
};
use crate::ports::{ConversationStore, DeliveryGateway, EndHold, EventPublisher, MessageFormat};

use super::HandoffPolicy;

/// Command to hand control back to the assistant.
#[derive(Debug, Clone)]
pub struct ReleaseControlCommand {
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    /// Operator asking for the release; `None` for system-initiated
    /// releases, which skip the holder check.
    pub released_by: Option<OperatorId>,
    /// Whether to tell the customer the assistant is back.
    pub notify_customer: bool,
    /// Reason recorded on the audit event.
    pub reason: ReleaseReason,
}

impl ReleaseControlCommand {
    /// An operator handing back their own hold.
    pub fn by_operator(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        operator_id: OperatorId,
    ) -> Self {
        Self {
            tenant_id,
            conversation_id,
            released_by: Some(operator_id),
            notify_customer: true,
            reason: ReleaseReason::Manual,
        }
    }

    /// A system-initiated release (expiry, tenant tooling).
    pub fn by_system(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        reason: ReleaseReason,
    ) -> Self {
        Self {
            tenant_id,
            conversation_id,
            released_by: None,
            notify_customer: true,
            reason,
        }
    }

    pub fn without_notice(mut self) -> Self {
        self.notify_customer = false;
        self
    }
}

/// Errors that can occur when releasing control.
#[derive(Debug, Clone, Error)]
pub enum ReleaseControlError {
    /// The conversation is already automated.
    #[error("Conversation is not under manual control")]
    NotManual,

    /// The requesting operator is not the current holder.
    #[error("Operator {operator_id} does not hold this conversation (held by {holder_id})")]
    NotHolder {
        operator_id: String,
        holder_id: String,
    },

    /// The hold changed between our read and the clear; control state
    /// was left untouched.
    #[error("The manual hold changed while releasing")]
    HoldChanged,

    /// Conversation does not exist in this tenant.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Store error during the release.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl From<DomainError> for ReleaseControlError {
    fn from(err: DomainError) -> Self {
        ReleaseControlError::StoreError(err.to_string())
    }
}

/// Result of a successful release.
#[derive(Debug, Clone)]
pub struct ReleaseControlResult {
    pub conversation_id: ConversationId,
    /// Operator whose hold just ended.
    pub holder_id: OperatorId,
    pub reason: ReleaseReason,
    /// How long the hold lasted, in whole minutes.
    pub held_minutes: i64,
    /// Whether the resume notice reached the customer.
    pub customer_notified: bool,
}

/// Handler for ReleaseControl commands.
pub struct ReleaseControlHandler<S, G, P>
where
    S: ConversationStore,
    G: DeliveryGateway,
    P: EventPublisher,
{
    store: Arc<S>,
    sender: MessageSender<G>,
    events: Arc<P>,
    policy: HandoffPolicy,
}

impl<S, G, P> ReleaseControlHandler<S, G, P>
where
    S: ConversationStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>, events: Arc<P>, policy: HandoffPolicy) -> Self {
        Self {
            store,
            sender: MessageSender::new(gateway),
            events,
            policy,
        }
    }

    /// Handles a release command.
    pub async fn handle(
        &self,
        cmd: ReleaseControlCommand,
    ) -> Result<ReleaseControlResult, ReleaseControlError> {
        let conversation = self
            .store
            .find(&cmd.tenant_id, &cmd.conversation_id)
            .await?
            .ok_or(ReleaseControlError::ConversationNotFound(cmd.conversation_id))?;

        let hold = conversation
            .control()
            .as_manual()
            .ok_or(ReleaseControlError::NotManual)?
            .clone();

        if let Some(operator_id) = &cmd.released_by {
            if !hold.is_held_by(operator_id) {
                return Err(ReleaseControlError::NotHolder {
                    operator_id: operator_id.to_string(),
                    holder_id: hold.holder().to_string(),
                });
            }
        }

        // Notify while the conversation is still manual per our read.
        // No re-lock: a concurrent change can at worst cost one notice.
        let customer_notified = if cmd.notify_customer {
            match self
                .sender
                .deliver(&conversation, &self.policy.resume_notice, MessageFormat::Text)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %cmd.conversation_id,
                        "Failed to deliver resume notice: {}",
                        e
                    );
                    false
                }
            }
        } else {
            false
        };

        match self
            .store
            .end_hold(&cmd.tenant_id, &cmd.conversation_id, hold.started_at())
            .await?
        {
            EndHold::Ended => {}
            EndHold::NotManual => return Err(ReleaseControlError::NotManual),
            EndHold::Superseded => return Err(ReleaseControlError::HoldChanged),
        }

        let held_minutes = Timestamp::now()
            .duration_since(&hold.started_at())
            .num_minutes();

        let event = ControlReleased::new(
            cmd.conversation_id,
            cmd.tenant_id,
            hold.holder().clone(),
            cmd.released_by.clone(),
            cmd.reason,
            held_minutes,
        );
        match event.to_envelope() {
            Ok(envelope) => {
                let envelope = match &cmd.released_by {
                    Some(operator_id) => envelope.with_operator_id(operator_id.as_str()),
                    None => envelope,
                };
                if let Err(e) = self.events.publish(envelope).await {
                    tracing::warn!(
                        conversation_id = %cmd.conversation_id,
                        "Failed to publish control.released event: {}",
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Failed to serialize control.released event: {}", e);
            }
        }

        Ok(ReleaseControlResult {
            conversation_id: cmd.conversation_id,
            holder_id: hold.holder().clone(),
            reason: cmd.reason,
            held_minutes,
            customer_notified,
        })
    }
}
