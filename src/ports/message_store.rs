//! MessageStore port - Append-only persistence for conversation messages.

use async_trait::async_trait;

use crate::domain::conversation::Message;
use crate::domain::foundation::{ConversationId, DomainError};

/// Port for the conversation message log.
///
/// The log is append-only: messages are never updated or deleted.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to the log.
    async fn append(&self, message: &Message) -> Result<(), DomainError>;

    /// List a conversation's messages, oldest first.
    async fn list_for_conversation(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, DomainError>;
}
