//! PostgreSQL adapters.
//!
//! Production implementations of the persistence ports, backed by sqlx.
//! Conversation control state, the message log, and the expiry task queue
//! each live in their own table; see `migrations/` for the schema.

mod conversation_store;
mod expiry_queue;
mod message_store;

pub use conversation_store::PostgresConversationStore;
pub use expiry_queue::PostgresExpiryQueue;
pub use message_store::PostgresMessageStore;
