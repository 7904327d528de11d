//! In-memory conversation store for testing.
//!
//! One async mutex guards the whole map, so hold transitions are
//! serialized exactly as the Postgres store serializes them with row
//! locks: concurrent take-overs queue up and precisely one sees the
//! conversation still automated.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::conversation::{Conversation, ManualHold};
use crate::domain::foundation::{ConversationId, DomainError, OperatorId, TenantId, Timestamp};
use crate::ports::{BeginHold, ConversationStore, EndHold, ExpiryTask, ExtendHold};

use super::InMemoryExpiryQueue;

/// In-memory conversation store for testing.
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<(TenantId, ConversationId), Conversation>>,
    expiry_queue: Arc<InMemoryExpiryQueue>,
}

impl InMemoryConversationStore {
    /// Create an empty store that schedules expiry checks on `expiry_queue`.
    pub fn new(expiry_queue: Arc<InMemoryExpiryQueue>) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            expiry_queue,
        }
    }

    // === Test Helpers ===

    /// Number of stored conversations.
    pub async fn conversation_count(&self) -> usize {
        self.conversations.lock().await.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, DomainError> {
        let conversations = self.conversations.lock().await;
        Ok(conversations.get(&(*tenant_id, *conversation_id)).cloned())
    }

    async fn begin_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        hold: ManualHold,
    ) -> Result<BeginHold, DomainError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = match conversations.get_mut(&(*tenant_id, *conversation_id)) {
            Some(conversation) => conversation,
            None => return Ok(BeginHold::NotFound),
        };

        if let Some(existing) = conversation.control().as_manual() {
            return Ok(BeginHold::AlreadyManual {
                holder: existing.holder().clone(),
            });
        }

        conversation.begin_manual(hold.clone())?;
        // Same atomic unit as the hold: the map lock is still held.
        self.expiry_queue
            .push(ExpiryTask::for_hold(*tenant_id, *conversation_id, &hold));
        Ok(BeginHold::Granted(conversation.clone()))
    }

    async fn end_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        expected_started_at: Timestamp,
    ) -> Result<EndHold, DomainError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = match conversations.get_mut(&(*tenant_id, *conversation_id)) {
            Some(conversation) => conversation,
            None => return Ok(EndHold::NotManual),
        };

        match conversation.control().as_manual() {
            None => Ok(EndHold::NotManual),
            Some(hold) if hold.started_at() != expected_started_at => Ok(EndHold::Superseded),
            Some(_) => {
                conversation.end_manual()?;
                Ok(EndHold::Ended)
            }
        }
    }

    async fn extend_hold(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
        holder: &OperatorId,
        new_expires_at: Timestamp,
    ) -> Result<ExtendHold, DomainError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = match conversations.get_mut(&(*tenant_id, *conversation_id)) {
            Some(conversation) => conversation,
            None => return Ok(ExtendHold::NotHeld),
        };

        match conversation.control().as_manual() {
            Some(hold) if hold.is_held_by(holder) => {
                conversation.extend_manual(new_expires_at)?;
                Ok(ExtendHold::Extended)
            }
            _ => Ok(ExtendHold::NotHeld),
        }
    }

    async fn insert(&self, conversation: &Conversation) -> Result<(), DomainError> {
        let mut conversations = self.conversations.lock().await;
        conversations.insert(
            (conversation.tenant_id(), conversation.id()),
            conversation.clone(),
        );
        Ok(())
    }
}
