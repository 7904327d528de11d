//! Mock delivery gateway for testing.
//!
//! Configurable stand-in for the HTTP channel gateway: records every
//! accepted message for assertions and can be set up to fail so callers'
//! error handling gets exercised.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::domain::conversation::ChannelAddress;
use crate::ports::{DeliveryGateway, DeliveryReceipt, GatewayError, MessageFormat};

/// One message the mock gateway accepted.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: ChannelAddress,
    pub text: String,
    pub format: MessageFormat,
    /// The receipt id the mock handed back for this send.
    pub external_message_id: String,
}

/// Mock delivery gateway for testing.
///
/// # Panics
///
/// Methods panic if the internal lock is poisoned. Acceptable for test
/// code; production uses the HTTP adapter.
pub struct MockDeliveryGateway {
    sent: RwLock<Vec<SentMessage>>,
    failure: Option<GatewayError>,
    next_id: AtomicU64,
}

impl MockDeliveryGateway {
    /// A gateway that accepts everything.
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failure: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// A gateway that rejects every send with `error`.
    pub fn failing_with(error: GatewayError) -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failure: Some(error),
            next_id: AtomicU64::new(1),
        }
    }

    // === Test Helpers ===

    /// Every message accepted so far, in send order.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent
            .read()
            .expect("MockDeliveryGateway: sent lock poisoned")
            .clone()
    }
}

impl Default for MockDeliveryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryGateway for MockDeliveryGateway {
    async fn send(
        &self,
        to: &ChannelAddress,
        text: &str,
        format: MessageFormat,
    ) -> Result<DeliveryReceipt, GatewayError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let external_message_id = format!("wamid.mock.{}", n);
        self.sent
            .write()
            .expect("MockDeliveryGateway: sent write lock poisoned")
            .push(SentMessage {
                to: to.clone(),
                text: text.to_string(),
                format,
                external_message_id: external_message_id.clone(),
            });

        Ok(DeliveryReceipt {
            external_message_id,
        })
    }
}
