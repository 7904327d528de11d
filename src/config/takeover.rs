//! Take-over policy configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Take-over policy configuration
///
/// Hold durations, message limits and the customer-facing notice copy.
/// Tenants tune the wording, so both notices are plain configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TakeoverConfig {
    /// Hold duration in minutes when the operator doesn't pick one
    #[serde(default = "default_hold_minutes")]
    pub default_hold_minutes: i32,

    /// Upper bound for a requested hold duration
    #[serde(default = "default_max_hold_minutes")]
    pub max_hold_minutes: i32,

    /// Maximum characters in an operator message body
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Notice delivered to the customer when an operator takes over
    #[serde(default = "default_handoff_notice")]
    pub handoff_notice: String,

    /// Notice delivered when the assistant resumes
    #[serde(default = "default_resume_notice")]
    pub resume_notice: String,
}

impl TakeoverConfig {
    /// Validate take-over configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_hold_minutes < 1 || self.default_hold_minutes > self.max_hold_minutes {
            return Err(ValidationError::InvalidHoldDuration);
        }
        if self.max_message_chars == 0 {
            return Err(ValidationError::InvalidMessageLimit);
        }
        if self.handoff_notice.trim().is_empty() || self.resume_notice.trim().is_empty() {
            return Err(ValidationError::EmptyNotice);
        }
        Ok(())
    }
}

impl Default for TakeoverConfig {
    fn default() -> Self {
        Self {
            default_hold_minutes: default_hold_minutes(),
            max_hold_minutes: default_max_hold_minutes(),
            max_message_chars: default_max_message_chars(),
            handoff_notice: default_handoff_notice(),
            resume_notice: default_resume_notice(),
        }
    }
}

fn default_hold_minutes() -> i32 {
    30
}

fn default_max_hold_minutes() -> i32 {
    480
}

fn default_max_message_chars() -> usize {
    4096
}

fn default_handoff_notice() -> String {
    "You are now chatting with a member of our support team.".to_string()
}

fn default_resume_notice() -> String {
    "Our virtual assistant is back to help you.".to_string()
}
