//! DeliveryGateway port - Outbound delivery to the customer's channel.
//!
//! The gateway is an external, vendor-operated service. Calls to it must
//! never happen while holding a database row lock.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::conversation::ChannelAddress;

/// Rendering hint for outbound message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Text,
    Markdown,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
        }
    }
}

/// Receipt returned by the gateway when it accepts a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Identifier the channel assigned to the delivered message.
    pub external_message_id: String,
}

/// Failure modes when handing a message to the channel gateway.
///
/// All variants mean the same thing to callers: the customer may not
/// have received the message, so nothing should be recorded as sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("channel gateway timed out: {0}")]
    Timeout(String),

    #[error("channel gateway rejected the message (status {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("channel gateway unavailable: {0}")]
    Unavailable(String),

    #[error("network error reaching channel gateway: {0}")]
    Network(String),
}

/// Port for delivering messages to customers.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Deliver `text` to the customer at `to`.
    ///
    /// A returned receipt means the gateway accepted the message;
    /// anything else must be treated as not delivered.
    async fn send(
        &self,
        to: &ChannelAddress,
        text: &str,
        format: MessageFormat,
    ) -> Result<DeliveryReceipt, GatewayError>;
}
