//! Ports: traits the application core depends on.
//!
//! Adapters implement these against Postgres, HTTP, Redis, or memory.

pub mod conversation_store;
pub mod delivery_gateway;
pub mod event_publisher;
pub mod event_subscriber;
pub mod expiry_queue;
pub mod message_store;

pub use conversation_store::{BeginHold, ConversationStore, EndHold, ExtendHold};
pub use delivery_gateway::{DeliveryGateway, DeliveryReceipt, GatewayError, MessageFormat};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use expiry_queue::{ExpiryQueue, ExpiryTask, TaskStatus};
pub use message_store::MessageStore;
