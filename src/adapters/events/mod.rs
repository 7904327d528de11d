//! Event bus adapters.
//!
//! - `in_memory` - Synchronous bus for tests
//! - `redis` - Pub/sub publisher for production

mod in_memory;
mod redis;

pub use in_memory::InMemoryEventBus;
pub use redis::RedisEventPublisher;
