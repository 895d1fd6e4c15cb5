//! Error types for the chat relay.

use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error type for the chat relay
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ChatError {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Failures raised by a live connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("send failed: {0}")]
    Send(String),
}
