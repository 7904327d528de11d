//! Command handlers coordinating domain operations across ports.

pub mod handoff;

pub use handoff::{
    ControlStateView, ExpireControlCommand, ExpireControlError, ExpireControlHandler,
    ExpireControlOutcome, GetControlStateError, GetControlStateHandler, GetControlStateQuery,
    HandoffPolicy, ReleaseControlCommand, ReleaseControlError, ReleaseControlHandler,
    ReleaseControlResult, SendOperatorMessageCommand, SendOperatorMessageError,
    SendOperatorMessageHandler, SendOperatorMessageResult, TakeControlCommand, TakeControlError,
    TakeControlHandler, TakeControlResult,
};
