//! Domain layer: conversations, messages, control state, and events.

pub mod conversation;
pub mod foundation;
