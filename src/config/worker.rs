//! Expiry worker configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Expiry worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between queue polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum tasks drained per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Base delay for retrying failed expiry checks, in seconds
    #[serde(default = "default_retry_base")]
    pub retry_base_secs: u64,

    /// Attempts before a task is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl WorkerConfig {
    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get retry base delay as Duration
    pub fn retry_base(&self) -> Duration {
        Duration::from_secs(self.retry_base_secs)
    }

    /// Validate worker configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.max_attempts == 0 || self.retry_base_secs == 0 {
            return Err(ValidationError::InvalidRetryPolicy);
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            retry_base_secs: default_retry_base(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1
}

fn default_batch_size() -> u32 {
    50
}

fn default_retry_base() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    5
}
