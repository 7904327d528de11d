//! Outbound delivery on behalf of a conversation.
//!
//! Every notice and operator message leaves through [`MessageSender`]. It
//! owns the checks all callers need (non-empty text, resolvable channel)
//! and turns every gateway failure into a typed error. Callers decide
//! whether a failure is fatal; the sender itself never panics.

use std::sync::Arc;
use thiserror::Error;

use crate::domain::conversation::Conversation;
use crate::ports::{DeliveryGateway, DeliveryReceipt, GatewayError, MessageFormat};

/// Typed failure when sending to a customer.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// Message text is empty or whitespace only.
    #[error("Validation error: message text cannot be empty")]
    EmptyText,

    /// The conversation has no channel address to deliver to.
    #[error("Conversation has no channel address")]
    NoChannelAddress,

    /// The gateway did not accept the message.
    #[error("Delivery failed: {0}")]
    Delivery(#[from] GatewayError),
}

/// Sends message text to the customer behind a conversation.
pub struct MessageSender<G>
where
    G: DeliveryGateway,
{
    gateway: Arc<G>,
}

impl<G> Clone for MessageSender<G>
where
    G: DeliveryGateway,
{
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<G> MessageSender<G>
where
    G: DeliveryGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Deliver `text` to the conversation's customer.
    ///
    /// Returns the gateway receipt on success. Anything else means the
    /// customer may not have received the message and nothing should be
    /// recorded as sent.
    pub async fn deliver(
        &self,
        conversation: &Conversation,
        text: &str,
        format: MessageFormat,
    ) -> Result<DeliveryReceipt, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::EmptyText);
        }

        let channel = conversation
            .channel()
            .ok_or(SendError::NoChannelAddress)?;

        let receipt = self.gateway.send(channel, text, format).await?;
        Ok(receipt)
    }
}
