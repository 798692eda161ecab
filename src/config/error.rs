//! Error types and result aliases.
//!
//! Defines the core `WafError` enumeration and common `Result` type.

use thiserror::Error;

/// WAF-specific errors.
#[derive(Debug, Error)]
pub enum WafError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A route rule could not be registered.
    #[error("invalid route '{path}': {reason}")]
    InvalidRoute { path: String, reason: String },

    /// Rule file could not be read.
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    /// Rule document could not be decoded.
    #[error("failed to parse rules: {0}")]
    Json(#[from] serde_json::Error),

    /// Webhook notification error.
    #[error("webhook error: {0}")]
    Webhook(String),
}

/// Result type alias for `WafError`.
pub type Result<T> = std::result::Result<T, WafError>;
