//! HTTP DTOs for hand-off endpoints.
//!
//! These types decouple the HTTP API from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};

use crate::application::handlers::handoff::{
    ControlStateView, ReleaseControlResult, SendOperatorMessageResult, TakeControlResult,
};

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request to take manual control of a conversation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoverRequest {
    /// Hold duration in minutes; the tenant default applies when absent.
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    /// Whether to tell the customer a human joined. Defaults to true.
    #[serde(default)]
    pub notify: Option<bool>,
}

/// Request to hand control back to the assistant. An empty object is a
/// valid body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    /// Whether to tell the customer the assistant is back. Defaults to true.
    #[serde(default)]
    pub notify: Option<bool>,
}

/// Request to send an operator message to the customer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub body: String,
    /// Whether the send also pushes the hold's expiry forward. Defaults
    /// to true.
    #[serde(default)]
    pub extend: Option<bool>,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// View of a freshly placed manual hold.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldResponse {
    pub conversation_id: String,
    pub holder_id: String,
    pub control_started_at: String,
    pub control_expires_at: String,
    pub customer_notified: bool,
}

impl From<TakeControlResult> for HoldResponse {
    fn from(result: TakeControlResult) -> Self {
        Self {
            conversation_id: result.conversation_id.to_string(),
            holder_id: result.holder_id.to_string(),
            control_started_at: result.control_started_at.as_datetime().to_rfc3339(),
            control_expires_at: result.control_expires_at.as_datetime().to_rfc3339(),
            customer_notified: result.customer_notified,
        }
    }
}

/// View of a completed release.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub conversation_id: String,
    /// Operator whose hold just ended.
    pub holder_id: String,
    pub reason: String,
    pub held_minutes: i64,
    pub customer_notified: bool,
}

impl From<ReleaseControlResult> for ReleaseResponse {
    fn from(result: ReleaseControlResult) -> Self {
        Self {
            conversation_id: result.conversation_id.to_string(),
            holder_id: result.holder_id.to_string(),
            reason: result.reason.as_str().to_string(),
            held_minutes: result.held_minutes,
            customer_notified: result.customer_notified,
        }
    }
}

/// View of a delivered and recorded operator message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSentResponse {
    pub message_id: String,
    /// Identifier the channel gateway assigned on delivery.
    pub external_message_id: String,
    /// The hold's new expiry, when this send extended it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_expires_at: Option<String>,
}

impl From<SendOperatorMessageResult> for MessageSentResponse {
    fn from(result: SendOperatorMessageResult) -> Self {
        Self {
            message_id: result.message_id.to_string(),
            external_message_id: result.external_message_id,
            control_expires_at: result
                .control_expires_at
                .map(|ts| ts.as_datetime().to_rfc3339()),
        }
    }
}

/// Current control state of a conversation.
///
/// `mode` is `"automated"` or `"manual"`; the remaining fields are only
/// present under manual control.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlStateResponse {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_expires_at: Option<String>,
    /// Whether the hold has lapsed but not yet been reclaimed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

impl From<ControlStateView> for ControlStateResponse {
    fn from(view: ControlStateView) -> Self {
        match view {
            ControlStateView::Automated => Self {
                mode: "automated".to_string(),
                holder_id: None,
                control_started_at: None,
                control_expires_at: None,
                expired: None,
            },
            ControlStateView::Manual {
                holder_id,
                started_at,
                expires_at,
                expired,
            } => Self {
                mode: "manual".to_string(),
                holder_id: Some(holder_id.to_string()),
                control_started_at: Some(started_at.as_datetime().to_rfc3339()),
                control_expires_at: Some(expires_at.as_datetime().to_rfc3339()),
                expired: Some(expired),
            },
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Error Response
// ════════════════════════════════════════════════════════════════════════════

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self {
            code: "NOT_FOUND".to_string(),
            message: format!("{} not found: {}", resource_type, id),
            details: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            code: "FORBIDDEN".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            code: "CONFLICT".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self {
            code: "VALIDATION_FAILED".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn delivery_failed(message: impl Into<String>) -> Self {
        Self {
            code: "DELIVERY_FAILED".to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach machine-readable context, such as the current holder.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
