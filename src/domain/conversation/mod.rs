//! Conversation aggregate, control state, messages, and events.

pub mod control;
pub mod conversation;
pub mod events;
pub mod message;

pub use control::{ControlState, ManualHold, ReleaseReason};
pub use conversation::{ChannelAddress, Conversation};
pub use events::{ControlReleased, ControlTaken, OperatorMessageSent};
pub use message::{Message, MessageOrigin};
