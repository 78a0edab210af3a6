//! Error types for the notification service
//!
//! Provides unified error handling using thiserror. The cache and the
//! broadcast registry have no failure modes and therefore no error type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

// == API Error Enum ==
/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing, invalid, or expired auth token
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed (blacklisted, not the owner)
    #[error("Forbidden")]
    Forbidden,

    /// Referenced resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Request body exceeds the configured limit
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(msg) => {
                error!("Internal error: {msg}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ApiError::NotFound(id),
            StorageError::NotOwner => ApiError::Forbidden,
            StorageError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::DomainNotAllowed => ApiError::Unauthorized,
            AuthError::Backend(msg) => ApiError::Internal(msg),
        }
    }
}

// == Transmit Error ==
/// Failure writing to one subscriber's stream. Terminal for that connection only.
#[derive(Error, Debug)]
pub enum TransmitError {
    /// The stream accepted zero bytes
    #[error("zero-byte write")]
    ZeroWrite,

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The receiving side of the stream is gone
    #[error("stream closed")]
    Closed,
}

// == Auth Error ==
/// Failures from the identity verification boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid or revoked token")]
    InvalidToken,

    #[error("email domain not allowed")]
    DomainNotAllowed,

    #[error("identity backend error: {0}")]
    Backend(String),
}

// == Storage Error ==
/// Failures from the post storage boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("post not found: {0}")]
    NotFound(String),

    #[error("post belongs to another user")]
    NotOwner,

    #[error("storage backend error: {0}")]
    Backend(String),
}

// == Result Type Alias ==
/// Convenience Result type for request handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
