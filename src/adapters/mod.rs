//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Event bus implementations (in-memory, Redis)
//! - `gateway` - HTTP channel gateway client
//! - `http` - Axum routes for the operator-facing API
//! - `memory` - In-memory stores for testing
//! - `postgres` - Persistence for conversations, messages and expiry tasks
//! - `worker` - Background expiry worker

pub mod events;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod worker;

pub use events::{InMemoryEventBus, RedisEventPublisher};
pub use gateway::HttpDeliveryGateway;
pub use postgres::{PostgresConversationStore, PostgresExpiryQueue, PostgresMessageStore};
pub use worker::{ExpiryWorker, ExpiryWorkerConfig};
