//! HTTP channel gateway adapter.
//!
//! Implements the `DeliveryGateway` trait against the messaging
//! platform's REST API. One endpoint matters here: `POST /v1/messages`,
//! which either returns the platform's message ID or refuses the send.
//!
//! # Security
//!
//! - API token handled via `secrecy::SecretString`
//! - Token is sent as a bearer credential, never logged

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ChannelAddress;
use crate::ports::{DeliveryGateway, DeliveryReceipt, GatewayError, MessageFormat};

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Channel gateway API configuration.
#[derive(Clone)]
pub struct HttpGatewayConfig {
    /// Bearer token for the platform API.
    api_token: SecretString,

    /// Base URL for the platform API.
    base_url: String,

    /// Per-request timeout.
    request_timeout: std::time::Duration,
}

impl HttpGatewayConfig {
    /// Create a new gateway configuration.
    pub fn new(api_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_token: SecretString::new(api_token.into()),
            base_url: base_url.into(),
            request_timeout: std::time::Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Set a custom per-request timeout.
    pub fn with_request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP implementation of DeliveryGateway.
pub struct HttpDeliveryGateway {
    config: HttpGatewayConfig,
    http_client: reqwest::Client,
}

impl HttpDeliveryGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: HttpGatewayConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DeliveryGateway for HttpDeliveryGateway {
    async fn send(
        &self,
        to: &ChannelAddress,
        text: &str,
        format: MessageFormat,
    ) -> Result<DeliveryReceipt, GatewayError> {
        let url = format!("{}/v1/messages", self.config.base_url);
        let request = SendMessageRequest {
            to: to.as_str(),
            text,
            format: format.as_str(),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.api_token.expose_secret())
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_server_error() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                detail = %detail,
                "Channel gateway unavailable"
            );
            return Err(GatewayError::Unavailable(format!(
                "status {}: {}",
                status.as_u16(),
                detail
            )));
        }

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                detail = %detail,
                "Channel gateway rejected message"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body: SendMessageResponse = response.json().await.map_err(|e| {
            GatewayError::Network(format!("Failed to parse gateway response: {}", e))
        })?;

        tracing::debug!(
            external_message_id = %body.message_id,
            "Message accepted by channel gateway"
        );

        Ok(DeliveryReceipt {
            external_message_id: body.message_id,
        })
    }
}

impl std::fmt::Debug for HttpDeliveryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDeliveryGateway")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    to: &'a str,
    text: &'a str,
    format: &'static str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    message_id: String,
}

fn classify_request_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(e.to_string())
    } else {
        GatewayError::Network(e.to_string())
    }
}
