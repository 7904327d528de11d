//! Application layer - commands and their handlers.
//!
//! This layer coordinates domain operations across ports. Each use case
//! gets a command struct, a typed error enum, and a handler generic over
//! the ports it touches.

pub mod handlers;
pub mod messaging;

pub use handlers::{
    ControlStateView, ExpireControlCommand, ExpireControlError, ExpireControlHandler,
    ExpireControlOutcome, GetControlStateError, GetControlStateHandler, GetControlStateQuery,
    HandoffPolicy, ReleaseControlCommand, ReleaseControlError, ReleaseControlHandler,
    ReleaseControlResult, SendOperatorMessageCommand, SendOperatorMessageError,
    SendOperatorMessageHandler, SendOperatorMessageResult, TakeControlCommand, TakeControlError,
    TakeControlHandler, TakeControlResult,
};
pub use messaging::{MessageSender, SendError};
