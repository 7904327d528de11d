//! In-memory adapters for testing.
//!
//! Deterministic implementations of the persistence and delivery ports.
//! They honor the same contracts as the production adapters (tenant
//! scoping, serialized hold transitions, append-only transcripts) so
//! handler tests exercise real semantics without infrastructure.

mod conversation_store;
mod expiry_queue;
mod gateway;
mod message_store;

pub use conversation_store::InMemoryConversationStore;
pub use expiry_queue::InMemoryExpiryQueue;
pub use gateway::{MockDeliveryGateway, SentMessage};
pub use message_store::InMemoryMessageStore;
