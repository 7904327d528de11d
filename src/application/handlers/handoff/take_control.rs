//! TakeControl command handler.
//!
//! Places a conversation under an operator's exclusive manual control.
//! The winner of a concurrent take-over race is decided by the store;
//! this handler turns the outcome into typed results and side effects
//! (customer notice, audit event) that happen strictly after the hold
//! is committed.

use std::sync::Arc;
use thiserror::Error;

use crate::application::messaging::MessageSender;
use crate::domain::conversation::{ControlTaken, ManualHold};
use crate::domain::foundation::{
    ConversationId, DomainError, OperatorId, SerializableDomainEvent, TenantId, Timestamp,
};
use crate::ports::{BeginHold, ConversationStore, DeliveryGateway, EventPublisher, MessageFormat};

use super::HandoffPolicy;

/// Command to take manual control of a conversation.
#[derive(Debug, Clone)]
pub struct TakeControlCommand {
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    pub operator_id: OperatorId,
    /// Hold duration in minutes; the policy default applies when absent.
    pub duration_minutes: Option<i32>,
    /// Whether to tell the customer a human joined.
    pub notify_customer: bool,
}

impl TakeControlCommand {
    pub fn new(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        operator_id: OperatorId,
    ) -> Self {
        Self {
            tenant_id,
            conversation_id,
            operator_id,
            duration_minutes: None,
            notify_customer: true,
        }
    }

    pub fn with_duration_minutes(mut self, minutes: i32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn without_notice(mut self) -> Self {
        self.notify_customer = false;
        self
    }
}

/// Errors that can occur when taking control.
#[derive(Debug, Clone, Error)]
pub enum TakeControlError {
    /// Another operator already holds the conversation.
    #[error("Conversation is already under manual control by {holder_id}")]
    AlreadyManual { holder_id: String },

    /// Conversation does not exist in this tenant.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Requested duration is out of bounds.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store error during the take-over.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl From<DomainError> for TakeControlError {
    fn from(err: DomainError) -> Self {
        TakeControlError::StoreError(err.to_string())
    }
}

/// Result of a successful take-over.
#[derive(Debug, Clone)]
pub struct TakeControlResult {
    pub conversation_id: ConversationId,
    pub holder_id: OperatorId,
    pub control_started_at: Timestamp,
    pub control_expires_at: Timestamp,
    /// Whether the hand-off notice reached the customer.
    pub customer_notified: bool,
}

/// Handler for TakeControl commands.
pub struct TakeControlHandler<S, G, P>
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

impl<S, G, P> TakeControlHandler<S, G, P>
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

    /// Handles a take-control command.
    ///
    /// On success the hold and its expiry check are durable before any
    /// notice or event leaves the process.
    pub async fn handle(&self, cmd: TakeControlCommand) -> Result<TakeControlResult, TakeControlError> {
        let duration = cmd.duration_minutes.unwrap_or(self.policy.default_hold_minutes);
        if duration < 1 || duration > self.policy.max_hold_minutes {
            return Err(TakeControlError::Validation(format!(
                "hold duration must be between 1 and {} minutes, got {}",
                self.policy.max_hold_minutes, duration
            )));
        }

        let now = Timestamp::now();
        let hold = ManualHold::new(
            cmd.operator_id.clone(),
            now,
            now.plus_minutes(i64::from(duration)),
        )
        .map_err(|e| TakeControlError::Validation(e.to_string()))?;

        let granted = self
            .store
            .begin_hold(&cmd.tenant_id, &cmd.conversation_id, hold.clone())
            .await?;

        let conversation = match granted {
            BeginHold::Granted(conversation) => conversation,
            BeginHold::AlreadyManual { holder } => {
                return Err(TakeControlError::AlreadyManual {
                    holder_id: holder.to_string(),
                });
            }
            BeginHold::NotFound => {
                return Err(TakeControlError::ConversationNotFound(cmd.conversation_id));
            }
        };

        // Hold and expiry check are committed. Everything below is
        // best-effort and must not undo the take-over.
        let customer_notified = if cmd.notify_customer {
            match self
                .sender
                .deliver(&conversation, &self.policy.handoff_notice, MessageFormat::Text)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(
                        conversation_id = %cmd.conversation_id,
                        "Failed to deliver hand-off notice: {}",
                        e
                    );
                    false
                }
            }
        } else {
            false
        };

        let event = ControlTaken::new(
            cmd.conversation_id,
            cmd.tenant_id,
            cmd.operator_id.clone(),
            hold.started_at(),
            hold.expires_at(),
        );
        match event.to_envelope() {
            Ok(envelope) => {
                let envelope = envelope.with_operator_id(cmd.operator_id.as_str());
                if let Err(e) = self.events.publish(envelope).await {
                    tracing::warn!(
                        conversation_id = %cmd.conversation_id,
                        "Failed to publish control.taken event: {}",
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Failed to serialize control.taken event: {}", e);
            }
        }

        Ok(TakeControlResult {
            conversation_id: conversation.id(),
            holder_id: cmd.operator_id,
            control_started_at: hold.started_at(),
            control_expires_at: hold.expires_at(),
            customer_notified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{
        InMemoryConversationStore, InMemoryExpiryQueue, MockDeliveryGateway,
    };
    use crate::domain::conversation::{ChannelAddress, Conversation};
    use crate::ports::GatewayError;

    struct Fixture {
        store: Arc<InMemoryConversationStore>,
        queue: Arc<InMemoryExpiryQueue>,
        gateway: Arc<MockDeliveryGateway>,
        events: Arc<InMemoryEventBus>,
        handler: TakeControlHandler<InMemoryConversationStore, MockDeliveryGateway, InMemoryEventBus>,
    }

    fn fixture_with_gateway(gateway: MockDeliveryGateway) -> Fixture {
        let queue = Arc::new(InMemoryExpiryQueue::new());
        let store = Arc::new(InMemoryConversationStore::new(Arc::clone(&queue)));
        let gateway = Arc::new(gateway);
        let events = Arc::new(InMemoryEventBus::new());
        let handler = TakeControlHandler::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::clone(&events),
            HandoffPolicy::default(),
        );
        Fixture {
            store,
            queue,
            gateway,
            events,
            handler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_gateway(MockDeliveryGateway::new())
    }

    async fn seed_conversation(fixture: &Fixture) -> Conversation {
        let conversation = Conversation::new(
            TenantId::new(),
            Some(ChannelAddress::new("whatsapp:+15550100").unwrap()),
        );
        fixture.store.insert(&conversation).await.unwrap();
        conversation
    }

    fn test_operator(id: &str) -> OperatorId {
        OperatorId::new(id).unwrap()
    }

    mod granting_control {
        use super::*;
        use crate::domain::conversation::ControlState;

        #[tokio::test]
        async fn places_hold_and_schedules_expiry_check() {
            // Given: an automated conversation
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;

            // When: an operator takes control
            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            );
            let result = fixture.handler.handle(cmd).await.unwrap();

            // Then: the stored conversation is manual with the same hold
            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            let hold = stored.control().as_manual().expect("expected manual hold");
            assert_eq!(hold.holder(), &test_operator("op-1"));
            assert_eq!(hold.started_at(), result.control_started_at);
            assert_eq!(hold.expires_at(), result.control_expires_at);

            // And: exactly one expiry check was scheduled, keyed to the hold
            let tasks = fixture.queue.tasks();
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].conversation_id, conversation.id());
            assert_eq!(tasks[0].run_at, hold.expires_at());
            assert_eq!(tasks[0].expected_control_started_at, hold.started_at());
        }

        #[tokio::test]
        async fn defaults_hold_duration_from_policy() {
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;

            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            );
            let result = fixture.handler.handle(cmd).await.unwrap();

            let held_for = result
                .control_expires_at
                .duration_since(&result.control_started_at);
            assert_eq!(held_for.num_minutes(), 30);
        }

        #[tokio::test]
        async fn honors_requested_duration() {
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;

            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            )
            .with_duration_minutes(90);
            let result = fixture.handler.handle(cmd).await.unwrap();

            let held_for = result
                .control_expires_at
                .duration_since(&result.control_started_at);
            assert_eq!(held_for.num_minutes(), 90);
        }

        #[tokio::test]
        async fn leaves_conversation_automated_on_validation_failure() {
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;

            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            )
            .with_duration_minutes(0);
            let result = fixture.handler.handle(cmd).await;

            assert!(matches!(result, Err(TakeControlError::Validation(_))));
            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.control(), &ControlState::Automated);
        }
    }

    mod exclusivity {
        use super::*;

        #[tokio::test]
        async fn rejects_takeover_while_already_manual() {
            // Given: a conversation held by op-1
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;
            let first = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            );
            fixture.handler.handle(first).await.unwrap();

            // When: op-2 tries to take over
            let second = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-2"),
            );
            let result = fixture.handler.handle(second).await;

            // Then: rejected, naming the current holder
            match result {
                Err(TakeControlError::AlreadyManual { holder_id }) => {
                    assert_eq!(holder_id, "op-1");
                }
                other => panic!("expected AlreadyManual, got {:?}", other),
            }

            // And: no second expiry check was scheduled
            assert_eq!(fixture.queue.tasks().len(), 1);
        }

        #[tokio::test]
        async fn concurrent_takeovers_grant_exactly_one() {
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;
            let handler = Arc::new(fixture.handler);

            let cmd_a = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-a"),
            );
            let cmd_b = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-b"),
            );

            let handler_a = Arc::clone(&handler);
            let handler_b = Arc::clone(&handler);
            let (result_a, result_b) = tokio::join!(
                tokio::spawn(async move { handler_a.handle(cmd_a).await }),
                tokio::spawn(async move { handler_b.handle(cmd_b).await }),
            );
            let results = [result_a.unwrap(), result_b.unwrap()];

            let granted = results.iter().filter(|r| r.is_ok()).count();
            let rejected = results
                .iter()
                .filter(|r| matches!(r, Err(TakeControlError::AlreadyManual { .. })))
                .count();
            assert_eq!(granted, 1);
            assert_eq!(rejected, 1);
            assert_eq!(fixture.queue.tasks().len(), 1);
        }
    }

    mod missing_conversation {
        use super::*;

        #[tokio::test]
        async fn fails_when_conversation_unknown() {
            let fixture = fixture();
            let unknown = ConversationId::new();

            let cmd = TakeControlCommand::new(TenantId::new(), unknown, test_operator("op-1"));
            let result = fixture.handler.handle(cmd).await;

            assert!(matches!(
                result,
                Err(TakeControlError::ConversationNotFound(id)) if id == unknown
            ));
        }
    }

    mod customer_notice {
        use super::*;

        #[tokio::test]
        async fn delivers_handoff_notice_by_default() {
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;

            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            );
            let result = fixture.handler.handle(cmd).await.unwrap();

            assert!(result.customer_notified);
            let sent = fixture.gateway.sent_messages();
            assert_eq!(sent.len(), 1);
            assert_eq!(
                sent[0].text,
                "You are now chatting with a member of our support team."
            );
        }

        #[tokio::test]
        async fn skips_notice_when_disabled() {
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;

            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            )
            .without_notice();
            let result = fixture.handler.handle(cmd).await.unwrap();

            assert!(!result.customer_notified);
            assert!(fixture.gateway.sent_messages().is_empty());
        }

        #[tokio::test]
        async fn takeover_survives_notice_failure() {
            // Given: a gateway that refuses everything
            let fixture = fixture_with_gateway(MockDeliveryGateway::failing_with(
                GatewayError::Timeout("deadline exceeded".to_string()),
            ));
            let conversation = seed_conversation(&fixture).await;

            // When: taking control with the default notice
            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            );
            let result = fixture.handler.handle(cmd).await.unwrap();

            // Then: the hold stands; only the notice was lost
            assert!(!result.customer_notified);
            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            assert!(stored.control().is_manual());
        }
    }

    mod audit {
        use super::*;

        #[tokio::test]
        async fn publishes_control_taken_event() {
            let fixture = fixture();
            let conversation = seed_conversation(&fixture).await;

            let cmd = TakeControlCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
            );
            fixture.handler.handle(cmd).await.unwrap();

            let published = fixture.events.events_of_type("control.taken.v1");
            assert_eq!(published.len(), 1);
            assert_eq!(published[0].aggregate_id, conversation.id().to_string());
            assert_eq!(published[0].payload["holder_id"], "op-1");
            assert_eq!(published[0].metadata.operator_id.as_deref(), Some("op-1"));
        }
    }
}
