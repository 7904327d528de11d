//! Channel gateway configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Channel gateway configuration
///
/// The gateway is the messaging platform API that delivers outbound
/// messages to customers. The token here is passed to the HTTP adapter,
/// which wraps it in a secret type before use.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Bearer token for the gateway API
    pub api_token: String,

    /// Base URL of the gateway API
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl GatewayConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_token.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_API_TOKEN"));
        }
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("GATEWAY_BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidGatewayUrl);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}
