//! SendOperatorMessage command handler.
//!
//! Delivers an operator-authored message to the customer and records it
//! in the transcript. Only the current holder of an unexpired manual
//! hold may send; each send also pushes the hold's expiry forward
//! unless the operator opted out.
//!
//! Ordering is deliver-then-record: the gateway call happens first, and
//! the message row is only written once the gateway accepted it. A
//! failed delivery therefore leaves no trace in the transcript, while a
//! failed write after a successful delivery is surfaced as its own
//! error so callers never retry the send blindly.

use std::sync::Arc;
use thiserror::Error;

use crate::application::messaging::{MessageSender, SendError};
use crate::domain::conversation::{Message, OperatorMessageSent};
use crate::domain::foundation::{
    ConversationId, DomainError, MessageId, OperatorId, SerializableDomainEvent, TenantId,
    Timestamp,
};
use crate::ports::{
    ConversationStore, DeliveryGateway, EventPublisher, ExtendHold, MessageFormat, MessageStore,
};

use super::HandoffPolicy;

/// Command to send a manual message to the customer.
#[derive(Debug, Clone)]
pub struct SendOperatorMessageCommand {
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    pub operator_id: OperatorId,
    pub body: String,
    /// Whether this send also pushes the hold's expiry forward.
    pub extend_hold: bool,
}

impl SendOperatorMessageCommand {
    pub fn new(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        operator_id: OperatorId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            conversation_id,
            operator_id,
            body: body.into(),
            extend_hold: true,
        }
    }

    /// Send without touching the hold's expiry.
    pub fn without_extension(mut self) -> Self {
        self.extend_hold = false;
        self
    }
}

/// Errors that can occur when sending an operator message.
#[derive(Debug, Clone, Error)]
pub enum SendOperatorMessageError {
    /// Message body is empty or whitespace only.
    #[error("Validation error: message body cannot be empty")]
    EmptyBody,

    /// Message body exceeds the tenant's size limit.
    #[error("Message body of {actual_chars} characters exceeds the limit of {max_chars}")]
    BodyTooLong {
        max_chars: usize,
        actual_chars: usize,
    },

    /// The conversation is under automated control.
    #[error("Conversation is not under manual control")]
    NotManual,

    /// The hold has lapsed; it no longer authorizes sends.
    #[error("The manual hold has expired")]
    HoldExpired,

    /// Another operator holds the conversation.
    #[error("Conversation is held by operator {holder_id}")]
    NotHolder { holder_id: String },

    /// Conversation does not exist in this tenant.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// The conversation has no channel address to deliver to.
    #[error("Conversation has no channel address")]
    ChannelUnresolvable,

    /// The gateway did not accept the message; nothing was recorded.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// The customer received the message but the transcript write
    /// failed. Retrying the send would duplicate the message.
    #[error("Message {external_message_id} was delivered but could not be recorded")]
    DeliveredButNotRecorded { external_message_id: String },

    /// Store error before anything was delivered.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl From<DomainError> for SendOperatorMessageError {
    fn from(err: DomainError) -> Self {
        SendOperatorMessageError::StoreError(err.to_string())
    }
}

impl From<SendError> for SendOperatorMessageError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::EmptyText => SendOperatorMessageError::EmptyBody,
            SendError::NoChannelAddress => SendOperatorMessageError::ChannelUnresolvable,
            SendError::Delivery(e) => SendOperatorMessageError::DeliveryFailed(e.to_string()),
        }
    }
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct SendOperatorMessageResult {
    pub message_id: MessageId,
    /// Identifier the channel gateway assigned on delivery.
    pub external_message_id: String,
    /// The hold's new expiry, when this send extended it.
    pub control_expires_at: Option<Timestamp>,
}

/// Handler for SendOperatorMessage commands.
pub struct SendOperatorMessageHandler<S, M, G, P>
where
    S: ConversationStore,
    M: MessageStore,
    G: DeliveryGateway,
    P: EventPublisher,
{
    store: Arc<S>,
    messages: Arc<M>,
    sender: MessageSender<G>,
    events: Arc<P>,
    policy: HandoffPolicy,
}

impl<S, M, G, P> SendOperatorMessageHandler<S, M, G, P>
where
    S: ConversationStore + 'static,
    M: MessageStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(
        store: Arc<S>,
        messages: Arc<M>,
        gateway: Arc<G>,
        events: Arc<P>,
        policy: HandoffPolicy,
    ) -> Self {
        Self {
            store,
            messages,
            sender: MessageSender::new(gateway),
            events,
            policy,
        }
    }

    /// Handles a send command.
    pub async fn handle(
        &self,
        cmd: SendOperatorMessageCommand,
    ) -> Result<SendOperatorMessageResult, SendOperatorMessageError> {
        let body = cmd.body.trim();
        if body.is_empty() {
            return Err(SendOperatorMessageError::EmptyBody);
        }
        let actual_chars = body.chars().count();
        if actual_chars > self.policy.max_message_chars {
            return Err(SendOperatorMessageError::BodyTooLong {
                max_chars: self.policy.max_message_chars,
                actual_chars,
            });
        }

        let conversation = self
            .store
            .find(&cmd.tenant_id, &cmd.conversation_id)
            .await?
            .ok_or(SendOperatorMessageError::ConversationNotFound(
                cmd.conversation_id,
            ))?;

        let hold = conversation
            .control()
            .as_manual()
            .ok_or(SendOperatorMessageError::NotManual)?;
        if hold.is_expired_at(&Timestamp::now()) {
            return Err(SendOperatorMessageError::HoldExpired);
        }
        if !hold.is_held_by(&cmd.operator_id) {
            return Err(SendOperatorMessageError::NotHolder {
                holder_id: hold.holder().to_string(),
            });
        }

        // Deliver first. The transcript only ever contains messages the
        // gateway accepted.
        let receipt = self
            .sender
            .deliver(&conversation, body, MessageFormat::Text)
            .await?;

        let message = Message::operator(
            cmd.conversation_id,
            cmd.operator_id.clone(),
            body,
            receipt.external_message_id.clone(),
        )
        .map_err(DomainError::from)?;

        if let Err(e) = self.messages.append(&message).await {
            tracing::error!(
                conversation_id = %cmd.conversation_id,
                operator_id = %cmd.operator_id,
                external_message_id = %receipt.external_message_id,
                "Operator message delivered but not recorded: {}",
                e
            );
            return Err(SendOperatorMessageError::DeliveredButNotRecorded {
                external_message_id: receipt.external_message_id,
            });
        }

        let control_expires_at = if cmd.extend_hold {
            self.extend(&cmd).await
        } else {
            None
        };

        let event = OperatorMessageSent::new(
            cmd.conversation_id,
            cmd.tenant_id,
            cmd.operator_id.clone(),
            message.id(),
            receipt.external_message_id.clone(),
            control_expires_at.is_some(),
        );
        match event.to_envelope() {
            Ok(envelope) => {
                let envelope = envelope.with_operator_id(cmd.operator_id.as_str());
                if let Err(e) = self.events.publish(envelope).await {
                    tracing::warn!(
                        conversation_id = %cmd.conversation_id,
                        "Failed to publish operator_message.sent event: {}",
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!("Failed to serialize operator_message.sent event: {}", e);
            }
        }

        Ok(SendOperatorMessageResult {
            message_id: message.id(),
            external_message_id: receipt.external_message_id,
            control_expires_at,
        })
    }

    /// Pushes the hold's expiry to one full hold duration from now.
    ///
    /// Best-effort: the message is already durable, so a hold that
    /// vanished or changed underneath us only skips the extension.
    async fn extend(&self, cmd: &SendOperatorMessageCommand) -> Option<Timestamp> {
        let new_expires_at =
            Timestamp::now().plus_minutes(i64::from(self.policy.default_hold_minutes));
        match self
            .store
            .extend_hold(
                &cmd.tenant_id,
                &cmd.conversation_id,
                &cmd.operator_id,
                new_expires_at,
            )
            .await
        {
            Ok(ExtendHold::Extended) => Some(new_expires_at),
            Ok(ExtendHold::NotHeld) => {
                tracing::warn!(
                    conversation_id = %cmd.conversation_id,
                    operator_id = %cmd.operator_id,
                    "Hold changed during send; expiry not extended"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %cmd.conversation_id,
                    "Failed to extend hold after send: {}",
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{
        InMemoryConversationStore, InMemoryExpiryQueue, InMemoryMessageStore, MockDeliveryGateway,
    };
    use crate::domain::conversation::{
        ChannelAddress, Conversation, ManualHold, MessageOrigin,
    };
    use crate::ports::{BeginHold, GatewayError};

    struct Fixture {
        store: Arc<InMemoryConversationStore>,
        queue: Arc<InMemoryExpiryQueue>,
        messages: Arc<InMemoryMessageStore>,
        gateway: Arc<MockDeliveryGateway>,
        events: Arc<InMemoryEventBus>,
        handler: SendOperatorMessageHandler<
            InMemoryConversationStore,
            InMemoryMessageStore,
            MockDeliveryGateway,
            InMemoryEventBus,
        >,
    }

    fn build_fixture(gateway: MockDeliveryGateway, policy: HandoffPolicy) -> Fixture {
        let queue = Arc::new(InMemoryExpiryQueue::new());
        let store = Arc::new(InMemoryConversationStore::new(Arc::clone(&queue)));
        let messages = Arc::new(InMemoryMessageStore::new());
        let gateway = Arc::new(gateway);
        let events = Arc::new(InMemoryEventBus::new());
        let handler = SendOperatorMessageHandler::new(
            Arc::clone(&store),
            Arc::clone(&messages),
            Arc::clone(&gateway),
            Arc::clone(&events),
            policy,
        );
        Fixture {
            store,
            queue,
            messages,
            gateway,
            events,
            handler,
        }
    }

    fn fixture() -> Fixture {
        build_fixture(MockDeliveryGateway::new(), HandoffPolicy::default())
    }

    fn test_operator(id: &str) -> OperatorId {
        OperatorId::new(id).unwrap()
    }

    /// Seeds a conversation and takes a hold through the store, so the
    /// expiry task exists just as it would after a real take-over.
    async fn seed_held_conversation(fixture: &Fixture, operator: &str) -> Conversation {
        let conversation = Conversation::new(
            TenantId::new(),
            Some(ChannelAddress::new("whatsapp:+15550100").unwrap()),
        );
        fixture.store.insert(&conversation).await.unwrap();
        let now = Timestamp::now();
        let hold =
            ManualHold::new(test_operator(operator), now, now.plus_minutes(30)).unwrap();
        let granted = fixture
            .store
            .begin_hold(&conversation.tenant_id(), &conversation.id(), hold)
            .await
            .unwrap();
        match granted {
            BeginHold::Granted(conversation) => conversation,
            other => panic!("expected Granted, got {:?}", other),
        }
    }

    fn send_command(conversation: &Conversation, operator: &str, body: &str) -> SendOperatorMessageCommand {
        SendOperatorMessageCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            test_operator(operator),
            body,
        )
    }

    mod validation {
        use super::*;

        #[tokio::test]
        async fn rejects_empty_body_without_delivering() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "   "))
                .await;

            assert!(matches!(result, Err(SendOperatorMessageError::EmptyBody)));
            assert!(fixture.gateway.sent_messages().is_empty());
        }

        #[tokio::test]
        async fn rejects_body_over_policy_limit() {
            let fixture = build_fixture(
                MockDeliveryGateway::new(),
                HandoffPolicy::default().with_max_message_chars(10),
            );
            let conversation = seed_held_conversation(&fixture, "op-1").await;

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "12345678901"))
                .await;

            match result {
                Err(SendOperatorMessageError::BodyTooLong {
                    max_chars,
                    actual_chars,
                }) => {
                    assert_eq!(max_chars, 10);
                    assert_eq!(actual_chars, 11);
                }
                other => panic!("expected BodyTooLong, got {:?}", other),
            }
            assert!(fixture.gateway.sent_messages().is_empty());
        }

        #[tokio::test]
        async fn limit_counts_characters_not_bytes() {
            // 10 four-byte emoji fit a 10-char limit.
            let fixture = build_fixture(
                MockDeliveryGateway::new(),
                HandoffPolicy::default().with_max_message_chars(10),
            );
            let conversation = seed_held_conversation(&fixture, "op-1").await;

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", &"🦀".repeat(10)))
                .await;

            assert!(result.is_ok());
        }
    }

    mod authorization {
        use super::*;

        #[tokio::test]
        async fn rejects_send_while_automated() {
            let fixture = fixture();
            let conversation = Conversation::new(
                TenantId::new(),
                Some(ChannelAddress::new("whatsapp:+15550100").unwrap()),
            );
            fixture.store.insert(&conversation).await.unwrap();

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "Hello"))
                .await;

            assert!(matches!(result, Err(SendOperatorMessageError::NotManual)));
            assert!(fixture.gateway.sent_messages().is_empty());
        }

        #[tokio::test]
        async fn rejects_send_by_non_holder() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-2", "Hello"))
                .await;

            match result {
                Err(SendOperatorMessageError::NotHolder { holder_id }) => {
                    assert_eq!(holder_id, "op-1");
                }
                other => panic!("expected NotHolder, got {:?}", other),
            }
            assert!(fixture.gateway.sent_messages().is_empty());
        }

        #[tokio::test]
        async fn rejects_send_once_hold_expired() {
            // Given: a hold that lapsed ten minutes ago
            let fixture = fixture();
            let conversation = Conversation::new(
                TenantId::new(),
                Some(ChannelAddress::new("whatsapp:+15550100").unwrap()),
            );
            fixture.store.insert(&conversation).await.unwrap();
            let started = Timestamp::now().minus_minutes(40);
            let hold = ManualHold::new(
                test_operator("op-1"),
                started,
                started.plus_minutes(30),
            )
            .unwrap();
            fixture
                .store
                .begin_hold(&conversation.tenant_id(), &conversation.id(), hold)
                .await
                .unwrap();

            // When: the holder tries to send anyway
            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "Still there?"))
                .await;

            // Then: the lapsed hold no longer authorizes sends
            assert!(matches!(result, Err(SendOperatorMessageError::HoldExpired)));
            assert!(fixture.gateway.sent_messages().is_empty());
        }

        #[tokio::test]
        async fn fails_when_conversation_unknown() {
            let fixture = fixture();
            let unknown = ConversationId::new();

            let cmd = SendOperatorMessageCommand::new(
                TenantId::new(),
                unknown,
                test_operator("op-1"),
                "Hello",
            );
            let result = fixture.handler.handle(cmd).await;

            assert!(matches!(
                result,
                Err(SendOperatorMessageError::ConversationNotFound(id)) if id == unknown
            ));
        }
    }

    mod delivery {
        use super::*;

        #[tokio::test]
        async fn delivers_then_records_the_message() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "On it, give me a minute."))
                .await
                .unwrap();

            let sent = fixture.gateway.sent_messages();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].text, "On it, give me a minute.");

            let recorded = fixture
                .messages
                .list_for_conversation(&conversation.id())
                .await
                .unwrap();
            assert_eq!(recorded.len(), 1);
            assert_eq!(recorded[0].id(), result.message_id);
            assert_eq!(recorded[0].origin(), MessageOrigin::Operator);
            assert_eq!(recorded[0].authored_by(), Some(&test_operator("op-1")));
            assert!(recorded[0].delivered());
            assert_eq!(
                recorded[0].external_id(),
                Some(result.external_message_id.as_str())
            );
        }

        #[tokio::test]
        async fn failed_delivery_records_nothing() {
            let fixture = build_fixture(
                MockDeliveryGateway::failing_with(GatewayError::Timeout(
                    "gateway timed out".to_string(),
                )),
                HandoffPolicy::default(),
            );
            let conversation = seed_held_conversation(&fixture, "op-1").await;
            let expiry_before = fixture.queue.tasks()[0].run_at;

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "Hello"))
                .await;

            assert!(matches!(
                result,
                Err(SendOperatorMessageError::DeliveryFailed(_))
            ));
            let recorded = fixture
                .messages
                .list_for_conversation(&conversation.id())
                .await
                .unwrap();
            assert!(recorded.is_empty());

            // The hold was not extended either.
            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            let hold = stored.control().as_manual().unwrap().clone();
            assert_eq!(fixture.queue.tasks()[0].run_at, expiry_before);
            assert!(!hold.is_expired_at(&Timestamp::now()));
        }
    }

    mod recording {
        use super::*;
        use crate::domain::foundation::{DomainError, ErrorCode};
        use async_trait::async_trait;

        /// Message store whose writes always fail.
        struct FailingMessageStore;

        #[async_trait]
        impl MessageStore for FailingMessageStore {
            async fn append(&self, _message: &Message) -> Result<(), DomainError> {
                Err(DomainError::new(
                    ErrorCode::DatabaseError,
                    "insert failed: connection closed",
                ))
            }

            async fn list_for_conversation(
                &self,
                _conversation_id: &ConversationId,
            ) -> Result<Vec<Message>, DomainError> {
                Ok(Vec::new())
            }
        }

        #[tokio::test]
        async fn surfaces_delivered_but_not_recorded() {
            let queue = Arc::new(InMemoryExpiryQueue::new());
            let store = Arc::new(InMemoryConversationStore::new(Arc::clone(&queue)));
            let gateway = Arc::new(MockDeliveryGateway::new());
            let handler = SendOperatorMessageHandler::new(
                Arc::clone(&store),
                Arc::new(FailingMessageStore),
                Arc::clone(&gateway),
                Arc::new(InMemoryEventBus::new()),
                HandoffPolicy::default(),
            );

            let conversation = Conversation::new(
                TenantId::new(),
                Some(ChannelAddress::new("whatsapp:+15550100").unwrap()),
            );
            store.insert(&conversation).await.unwrap();
            let now = Timestamp::now();
            let hold = ManualHold::new(test_operator("op-1"), now, now.plus_minutes(30)).unwrap();
            store
                .begin_hold(&conversation.tenant_id(), &conversation.id(), hold)
                .await
                .unwrap();

            let cmd = SendOperatorMessageCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                test_operator("op-1"),
                "Hello",
            );
            let result = handler.handle(cmd).await;

            // The customer got the message; the caller must not retry.
            match result {
                Err(SendOperatorMessageError::DeliveredButNotRecorded { external_message_id }) => {
                    assert_eq!(
                        external_message_id,
                        gateway.sent_messages()[0].external_message_id
                    );
                }
                other => panic!("expected DeliveredButNotRecorded, got {:?}", other),
            }
        }
    }

    mod extension {
        use super::*;

        #[tokio::test]
        async fn send_extends_hold_by_default() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;
            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            let original_expiry = stored.control().as_manual().unwrap().expires_at();

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "Checking now"))
                .await
                .unwrap();

            // A fresh 30 minutes from the send, later than the original expiry.
            let new_expiry = result.control_expires_at.unwrap();
            assert!(new_expiry.is_after(&original_expiry));

            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            let hold = stored.control().as_manual().unwrap().clone();
            assert_eq!(hold.expires_at(), new_expiry);
            assert_eq!(hold.holder(), &test_operator("op-1"));
        }

        #[tokio::test]
        async fn extension_does_not_reschedule_the_expiry_check() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;
            let scheduled_run_at = fixture.queue.tasks()[0].run_at;

            fixture
                .handler
                .handle(send_command(&conversation, "op-1", "Checking now"))
                .await
                .unwrap();

            // Still the single task from the take-over, untouched. The
            // worker re-checks the live expiry when it fires.
            let tasks = fixture.queue.tasks();
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].run_at, scheduled_run_at);
        }

        #[tokio::test]
        async fn without_extension_leaves_expiry_unchanged() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;
            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            let original_expiry = stored.control().as_manual().unwrap().expires_at();

            let result = fixture
                .handler
                .handle(
                    send_command(&conversation, "op-1", "Checking now").without_extension(),
                )
                .await
                .unwrap();

            assert!(result.control_expires_at.is_none());
            let stored = fixture
                .store
                .find(&conversation.tenant_id(), &conversation.id())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(
                stored.control().as_manual().unwrap().expires_at(),
                original_expiry
            );
        }
    }

    mod audit {
        use super::*;

        #[tokio::test]
        async fn publishes_operator_message_sent_event() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;

            let result = fixture
                .handler
                .handle(send_command(&conversation, "op-1", "Hello"))
                .await
                .unwrap();

            let published = fixture.events.events_of_type("operator_message.sent.v1");
            assert_eq!(published.len(), 1);
            assert_eq!(
                published[0].payload["external_message_id"],
                result.external_message_id.as_str()
            );
            assert_eq!(published[0].payload["extended_hold"], true);
            assert_eq!(published[0].metadata.operator_id.as_deref(), Some("op-1"));
        }

        #[tokio::test]
        async fn event_reflects_skipped_extension() {
            let fixture = fixture();
            let conversation = seed_held_conversation(&fixture, "op-1").await;

            fixture
                .handler
                .handle(send_command(&conversation, "op-1", "Hello").without_extension())
                .await
                .unwrap();

            let published = fixture.events.events_of_type("operator_message.sent.v1");
            assert_eq!(published[0].payload["extended_hold"], false);
        }
    }
}
