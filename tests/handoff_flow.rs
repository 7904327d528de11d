//! Integration tests for the conversation hand-off flow.
//!
//! These tests verify the end-to-end flow:
//! 1. An operator takes control: an exclusive timed hold plus a scheduled
//!    expiry check, written together
//! 2. Operator messages are delivered through the channel gateway and
//!    extend the hold by default
//! 3. Release puts the assistant back in charge; the expiry worker does
//!    the same for holds nobody released
//!
//! Uses in-memory implementations to test the flow without external dependencies.

use std::sync::Arc;

use tandem::adapters::events::InMemoryEventBus;
use tandem::adapters::memory::{
    InMemoryConversationStore, InMemoryExpiryQueue, InMemoryMessageStore, MockDeliveryGateway,
};
use tandem::adapters::worker::ExpiryWorker;
use tandem::application::handlers::handoff::{
    ExpireControlCommand, ExpireControlHandler, ExpireControlOutcome, HandoffPolicy,
    ReleaseControlCommand, ReleaseControlError, ReleaseControlHandler, SendOperatorMessageCommand,
    SendOperatorMessageError, SendOperatorMessageHandler, TakeControlCommand, TakeControlError,
    TakeControlHandler,
};
use tandem::domain::conversation::{ChannelAddress, Conversation, ManualHold, ReleaseReason};
use tandem::domain::foundation::{OperatorId, TenantId, Timestamp};
use tandem::ports::{ConversationStore, ExpiryTask, GatewayError};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Everything a hand-off scenario needs, wired against the in-memory adapters.
struct Harness {
    store: Arc<InMemoryConversationStore>,
    queue: Arc<InMemoryExpiryQueue>,
    gateway: Arc<MockDeliveryGateway>,
    messages: Arc<InMemoryMessageStore>,
    events: Arc<InMemoryEventBus>,
    take: TakeControlHandler<InMemoryConversationStore, MockDeliveryGateway, InMemoryEventBus>,
    send: SendOperatorMessageHandler<
        InMemoryConversationStore,
        InMemoryMessageStore,
        MockDeliveryGateway,
        InMemoryEventBus,
    >,
    release:
        ReleaseControlHandler<InMemoryConversationStore, MockDeliveryGateway, InMemoryEventBus>,
}

impl Harness {
    fn new() -> Self {
        Self::with_gateway(MockDeliveryGateway::new())
    }

    fn with_gateway(gateway: MockDeliveryGateway) -> Self {
        let queue = Arc::new(InMemoryExpiryQueue::new());
        let store = Arc::new(InMemoryConversationStore::new(Arc::clone(&queue)));
        let gateway = Arc::new(gateway);
        let messages = Arc::new(InMemoryMessageStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let policy = HandoffPolicy::default();

        Self {
            take: TakeControlHandler::new(
                Arc::clone(&store),
                Arc::clone(&gateway),
                Arc::clone(&events),
                policy.clone(),
            ),
            send: SendOperatorMessageHandler::new(
                Arc::clone(&store),
                Arc::clone(&messages),
                Arc::clone(&gateway),
                Arc::clone(&events),
                policy.clone(),
            ),
            release: ReleaseControlHandler::new(
                Arc::clone(&store),
                Arc::clone(&gateway),
                Arc::clone(&events),
                policy,
            ),
            store,
            queue,
            gateway,
            messages,
            events,
        }
    }

    fn expire_handler(
        &self,
    ) -> ExpireControlHandler<InMemoryConversationStore, MockDeliveryGateway, InMemoryEventBus>
    {
        ExpireControlHandler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.gateway),
            Arc::clone(&self.events),
            HandoffPolicy::default(),
        )
    }

    async fn seed_conversation(&self) -> Conversation {
        let conversation = Conversation::new(
            TenantId::new(),
            Some(ChannelAddress::new("whatsapp:+15550100").unwrap()),
        );
        self.store.insert(&conversation).await.unwrap();
        conversation
    }

    /// The conversation as currently persisted.
    async fn stored(&self, conversation: &Conversation) -> Conversation {
        self.store
            .find(&conversation.tenant_id(), &conversation.id())
            .await
            .unwrap()
            .expect("conversation should exist")
    }

    fn take_command(&self, conversation: &Conversation, operator_id: &str) -> TakeControlCommand {
        TakeControlCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            operator(operator_id),
        )
    }
}

fn operator(id: &str) -> OperatorId {
    OperatorId::new(id).unwrap()
}

// =============================================================================
// Integration Tests
// =============================================================================

/// An operator takes over: the hold is written with the default duration,
/// the customer hears about it, and an expiry check is scheduled for the
/// moment the hold lapses.
#[tokio::test]
async fn take_over_grants_a_timed_hold_and_notifies_the_customer() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    let granted = harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    assert_eq!(granted.holder_id.as_str(), "op-maria");
    assert_eq!(
        granted.control_expires_at,
        granted.control_started_at.plus_minutes(30)
    );
    assert!(granted.customer_notified);

    let stored = harness.stored(&conversation).await;
    let hold = stored.control().as_manual().expect("hold should be stored");
    assert_eq!(hold.holder().as_str(), "op-maria");

    let sent = harness.gateway.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, HandoffPolicy::default().handoff_notice);

    let tasks = harness.queue.pending_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].run_at, granted.control_expires_at);

    assert_eq!(harness.events.events_of_type("control.taken.v1").len(), 1);
}

/// Two operators race for the same conversation; exactly one wins and the
/// loser is told who holds it.
#[tokio::test]
async fn concurrent_take_over_has_exactly_one_winner() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    let first = harness.take.handle(harness.take_command(&conversation, "op-ana"));
    let second = harness.take.handle(harness.take_command(&conversation, "op-ben"));
    let outcomes = {
        let (first, second) = tokio::join!(first, second);
        [first, second]
    };

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);

    let stored = harness.stored(&conversation).await;
    let holder = stored
        .control()
        .as_manual()
        .expect("one hold should have landed")
        .holder()
        .clone();

    let loser = outcomes.iter().find(|o| o.is_err()).unwrap();
    match loser {
        Err(TakeControlError::AlreadyManual { holder_id }) => {
            assert_eq!(holder_id, holder.as_str());
        }
        other => panic!("expected AlreadyManual, got {:?}", other),
    }

    // One hold, one scheduled check, one audit event.
    assert_eq!(harness.queue.pending_tasks().len(), 1);
    assert_eq!(harness.events.events_of_type("control.taken.v1").len(), 1);
}

/// An operator message goes out through the gateway, lands in the
/// transcript and pushes the hold's expiry forward. The already scheduled
/// expiry check stays where it was.
#[tokio::test]
async fn operator_message_reaches_the_customer_and_extends_the_hold() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    let granted = harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    let result = harness
        .send
        .handle(SendOperatorMessageCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-maria"),
            "We shipped the replacement this morning.",
        ))
        .await
        .unwrap();

    let sent = harness.gateway.sent_messages();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].text, "We shipped the replacement this morning.");
    assert_eq!(sent[1].external_message_id, result.external_message_id);

    assert_eq!(harness.messages.message_count().await, 1);

    let new_expiry = result
        .control_expires_at
        .expect("send should extend the hold");
    assert!(!new_expiry.is_before(&granted.control_expires_at));
    let stored = harness.stored(&conversation).await;
    assert_eq!(stored.control().as_manual().unwrap().expires_at(), new_expiry);

    let tasks = harness.queue.pending_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].run_at, granted.control_expires_at);

    assert_eq!(
        harness.events.events_of_type("operator_message.sent.v1").len(),
        1
    );
}

/// Sending with extension disabled delivers the message but leaves the
/// hold's deadline alone.
#[tokio::test]
async fn send_without_extension_leaves_the_deadline_alone() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    let granted = harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    let result = harness
        .send
        .handle(
            SendOperatorMessageCommand::new(
                conversation.tenant_id(),
                conversation.id(),
                operator("op-maria"),
                "One quick note before I step away.",
            )
            .without_extension(),
        )
        .await
        .unwrap();

    assert!(result.control_expires_at.is_none());
    let stored = harness.stored(&conversation).await;
    assert_eq!(
        stored.control().as_manual().unwrap().expires_at(),
        granted.control_expires_at
    );
}

/// A second operator cannot speak through someone else's hold.
#[tokio::test]
async fn only_the_holder_may_send() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    let result = harness
        .send
        .handle(SendOperatorMessageCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-intruder"),
            "Let me jump in here.",
        ))
        .await;

    match result {
        Err(SendOperatorMessageError::NotHolder { holder_id }) => {
            assert_eq!(holder_id, "op-maria");
        }
        other => panic!("expected NotHolder, got {:?}", other),
    }

    // Only the hand-off notice left the building; nothing hit the transcript.
    assert_eq!(harness.gateway.sent_messages().len(), 1);
    assert_eq!(harness.messages.message_count().await, 0);
}

/// When the gateway is down the take-over stands (the notice is best
/// effort) but a failed operator send records nothing: no transcript row
/// for a message the customer never saw.
#[tokio::test]
async fn failed_delivery_leaves_no_trace_in_the_transcript() {
    let harness = Harness::with_gateway(MockDeliveryGateway::failing_with(
        GatewayError::Unavailable("connection refused".to_string()),
    ));
    let conversation = harness.seed_conversation().await;

    let granted = harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();
    assert!(!granted.customer_notified);

    let result = harness
        .send
        .handle(SendOperatorMessageCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-maria"),
            "Are you still there?",
        ))
        .await;

    assert!(matches!(
        result,
        Err(SendOperatorMessageError::DeliveryFailed(_))
    ));
    assert_eq!(harness.messages.message_count().await, 0);

    // The failed send did not touch the hold either.
    let stored = harness.stored(&conversation).await;
    assert_eq!(
        stored.control().as_manual().unwrap().expires_at(),
        granted.control_expires_at
    );
}

/// Releasing hands the conversation back: control goes automated, the
/// customer hears the assistant is back and the release is audited as
/// manual.
#[tokio::test]
async fn release_returns_the_conversation_to_the_assistant() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    let result = harness
        .release
        .handle(ReleaseControlCommand::by_operator(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-maria"),
        ))
        .await
        .unwrap();

    assert_eq!(result.holder_id.as_str(), "op-maria");
    assert_eq!(result.reason, ReleaseReason::Manual);
    assert!(result.customer_notified);

    let stored = harness.stored(&conversation).await;
    assert!(stored.control().as_manual().is_none());

    let sent = harness.gateway.sent_messages();
    assert_eq!(
        sent.last().unwrap().text,
        HandoffPolicy::default().resume_notice
    );

    let released = harness.events.events_of_type("control.released.v1");
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].payload["reason"], "manual");
}

/// Only the holder may release.
#[tokio::test]
async fn release_by_someone_else_is_rejected() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    let result = harness
        .release
        .handle(ReleaseControlCommand::by_operator(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-intruder"),
        ))
        .await;

    assert!(matches!(result, Err(ReleaseControlError::NotHolder { .. })));

    let stored = harness.stored(&conversation).await;
    assert_eq!(
        stored.control().as_manual().unwrap().holder().as_str(),
        "op-maria"
    );
}

/// Releasing twice: the second attempt finds nothing to release.
#[tokio::test]
async fn double_release_reports_nothing_to_release() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    let command = ReleaseControlCommand::by_operator(
        conversation.tenant_id(),
        conversation.id(),
        operator("op-maria"),
    );
    harness.release.handle(command.clone()).await.unwrap();
    let second = harness.release.handle(command).await;

    assert!(matches!(second, Err(ReleaseControlError::NotManual)));
}

/// The worker finds a lapsed hold, returns control to the assistant and
/// settles the check. The release is attributed to the timeout.
#[tokio::test]
async fn expiry_worker_reclaims_a_lapsed_hold() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    // A hold that lapsed ten minutes ago; its expiry check is already due.
    let now = Timestamp::now();
    let hold = ManualHold::new(
        operator("op-maria"),
        now.minus_minutes(40),
        now.minus_minutes(10),
    )
    .unwrap();
    harness
        .store
        .begin_hold(&conversation.tenant_id(), &conversation.id(), hold)
        .await
        .unwrap();

    let worker = ExpiryWorker::new(Arc::clone(&harness.queue), harness.expire_handler());
    let settled = worker.poll_once().await.unwrap();
    assert_eq!(settled, 1);

    let stored = harness.stored(&conversation).await;
    assert!(stored.control().as_manual().is_none());
    assert!(harness.queue.pending_tasks().is_empty());

    let released = harness.events.events_of_type("control.released.v1");
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].payload["reason"], "timeout");

    // The customer heard the assistant is back.
    let sent = harness.gateway.sent_messages();
    assert_eq!(
        sent.last().unwrap().text,
        HandoffPolicy::default().resume_notice
    );
}

/// An extended hold outlives its original expiry check: the check settles
/// as a no-op and the hold runs until the operator releases it.
#[tokio::test]
async fn expiry_check_on_an_extended_hold_settles_without_reclaiming() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    let granted = harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();

    harness
        .send
        .handle(SendOperatorMessageCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-maria"),
            "Checking with the warehouse now.",
        ))
        .await
        .unwrap();

    // Fast-forward: plant a due copy of the scheduled check instead of
    // waiting out the original deadline.
    let hold = ManualHold::new(
        operator("op-maria"),
        granted.control_started_at,
        granted.control_expires_at,
    )
    .unwrap();
    let mut check = ExpiryTask::for_hold(conversation.tenant_id(), conversation.id(), &hold);
    check.run_at = Timestamp::now().minus_minutes(1);
    harness.queue.push(check);

    let worker = ExpiryWorker::new(Arc::clone(&harness.queue), harness.expire_handler());
    let settled = worker.poll_once().await.unwrap();
    assert_eq!(settled, 1);

    // The hold survives; an extended hold ends only by explicit release.
    let stored = harness.stored(&conversation).await;
    assert!(stored.control().as_manual().is_some());
    assert!(harness.events.events_of_type("control.released.v1").is_empty());

    // Only the original check is still pending.
    assert_eq!(harness.queue.pending_tasks().len(), 1);
}

/// A check scheduled for a hold that was since released and replaced must
/// not touch the newer hold.
#[tokio::test]
async fn stale_expiry_check_leaves_a_newer_hold_alone() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    let first = harness
        .take
        .handle(harness.take_command(&conversation, "op-ana"))
        .await
        .unwrap();
    harness
        .release
        .handle(ReleaseControlCommand::by_operator(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-ana"),
        ))
        .await
        .unwrap();
    harness
        .take
        .handle(harness.take_command(&conversation, "op-ben"))
        .await
        .unwrap();

    // The first hold's check fires after the conversation changed hands.
    let outcome = harness
        .expire_handler()
        .handle(ExpireControlCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            first.control_started_at,
        ))
        .await
        .unwrap();

    assert_eq!(outcome, ExpireControlOutcome::StaleHold);

    let stored = harness.stored(&conversation).await;
    assert_eq!(
        stored.control().as_manual().unwrap().holder().as_str(),
        "op-ben"
    );
}

/// Walks the whole hand-off: take over, talk, hand back. The audit trail
/// records each step in order and the customer saw notice, message and
/// resume notice.
#[tokio::test]
async fn hand_off_lifecycle_emits_the_audit_trail_in_order() {
    let harness = Harness::new();
    let conversation = harness.seed_conversation().await;

    harness
        .take
        .handle(harness.take_command(&conversation, "op-maria"))
        .await
        .unwrap();
    harness
        .send
        .handle(SendOperatorMessageCommand::new(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-maria"),
            "Refund issued, you should see it within two days.",
        ))
        .await
        .unwrap();
    harness
        .release
        .handle(ReleaseControlCommand::by_operator(
            conversation.tenant_id(),
            conversation.id(),
            operator("op-maria"),
        ))
        .await
        .unwrap();

    let types: Vec<String> = harness
        .events
        .published_events()
        .iter()
        .map(|envelope| envelope.event_type.clone())
        .collect();
    assert_eq!(
        types,
        vec![
            "control.taken.v1",
            "operator_message.sent.v1",
            "control.released.v1"
        ]
    );

    assert_eq!(harness.gateway.sent_messages().len(), 3);
    assert_eq!(harness.messages.message_count().await, 1);
}
