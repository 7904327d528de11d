//! In-memory message store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::conversation::Message;
use crate::domain::foundation::{ConversationId, DomainError};
use crate::ports::MessageStore;

/// In-memory message store for testing.
///
/// Append-only, like the real table: nothing here ever rewrites or
/// removes a recorded message.
pub struct InMemoryMessageStore {
    messages: RwLock<HashMap<ConversationId, Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
        }
    }

    // === Test Helpers ===

    /// Total number of stored messages across all conversations.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.values().map(Vec::len).sum()
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: &Message) -> Result<(), DomainError> {
        let mut messages = self.messages.write().await;
        messages
            .entry(message.conversation_id())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, DomainError> {
        let messages = self.messages.read().await;
        Ok(messages.get(conversation_id).cloned().unwrap_or_default())
    }
}
