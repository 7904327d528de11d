//! Hand-off command handlers.
//!
//! Four coordinators cover the control life cycle:
//!
//! - [`TakeControlHandler`] places a manual hold and schedules its expiry
//! - [`SendOperatorMessageHandler`] delivers operator messages and keeps
//!   the hold alive
//! - [`ReleaseControlHandler`] hands control back to the assistant
//! - [`ExpireControlHandler`] reclaims lapsed holds on behalf of the
//!   expiry worker
//!
//! [`GetControlStateHandler`] serves the read side: the control panel
//! refreshes from it after a rejected take-over.

pub mod expire_control;
pub mod get_control_state;
pub mod release_control;
pub mod send_operator_message;
pub mod take_control;

pub use expire_control::{
    ExpireControlCommand, ExpireControlError, ExpireControlHandler, ExpireControlOutcome,
};
pub use get_control_state::{
    ControlStateView, GetControlStateError, GetControlStateHandler, GetControlStateQuery,
};
pub use release_control::{
    ReleaseControlCommand, ReleaseControlError, ReleaseControlHandler, ReleaseControlResult,
};
pub use send_operator_message::{
    SendOperatorMessageCommand, SendOperatorMessageError, SendOperatorMessageHandler,
    SendOperatorMessageResult,
};
pub use take_control::{
    TakeControlCommand, TakeControlError, TakeControlHandler, TakeControlResult,
};

/// Tunable policy shared by the hand-off handlers.
///
/// | Setting              | Default |
/// |----------------------|---------|
/// | `default_hold_minutes` | 30    |
/// | `max_hold_minutes`     | 480   |
/// | `max_message_chars`    | 4096  |
#[derive(Debug, Clone)]
pub struct HandoffPolicy {
    /// Hold duration when the operator doesn't pick one. Extensions use
    /// the same duration, measured from the moment of the send.
    pub default_hold_minutes: i32,

    /// Upper bound for a requested hold duration.
    pub max_hold_minutes: i32,

    /// Maximum characters in an operator message body.
    pub max_message_chars: usize,

    /// Notice delivered to the customer when an operator takes over.
    pub handoff_notice: String,

    /// Notice delivered when the assistant resumes.
    pub resume_notice: String,
}

impl Default for HandoffPolicy {
    fn default() -> Self {
        Self {
            default_hold_minutes: 30,
            max_hold_minutes: 480,
            max_message_chars: 4096,
            handoff_notice: "You are now chatting with a member of our support team.".to_string(),
            resume_notice: "Our virtual assistant is back to help you.".to_string(),
        }
    }
}

impl HandoffPolicy {
    pub fn with_default_hold_minutes(mut self, minutes: i32) -> Self {
        self.default_hold_minutes = minutes;
        self
    }

    pub fn with_max_message_chars(mut self, chars: usize) -> Self {
        self.max_message_chars = chars;
        self
    }
}
