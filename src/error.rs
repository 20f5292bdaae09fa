//! Error types for the tenant limits crate.

use thiserror::Error;

/// Main error type for tenant limit operations.
#[derive(Error, Debug)]
pub enum TenantLimitsError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key-value store failures
    #[error("Store error: {0}")]
    Store(String),

    /// A hook ran without the request state it depends on
    #[error("Request context error: {0}")]
    Context(String),

    /// JSON encoding or decoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tenant limit operations.
pub type Result<T> = std::result::Result<T, TenantLimitsError>;
