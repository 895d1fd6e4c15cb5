//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use parlor_chats::ChatError;

/// Gateway error types
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::WebSocketError(_) => StatusCode::BAD_REQUEST,
            GatewayError::InternalError(_) | GatewayError::StorageError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<ChatError> for GatewayError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::Storage { message } => GatewayError::StorageError(message),
            ChatError::Validation { message } => GatewayError::InvalidRequest(message),
            ChatError::Serialization(err) => GatewayError::InternalError(err.to_string()),
            ChatError::Transport(err) => GatewayError::WebSocketError(err.to_string()),
        }
    }
}
