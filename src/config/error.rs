//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Gateway base URL must start with http:// or https://")]
    InvalidGatewayUrl,

    #[error("Default hold duration must be between 1 minute and the maximum")]
    InvalidHoldDuration,

    #[error("Message character limit must be at least 1")]
    InvalidMessageLimit,

    #[error("Customer notice text cannot be empty")]
    EmptyNotice,

    #[error("Worker batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Worker retry policy must allow at least one attempt")]
    InvalidRetryPolicy,
}
