//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror. Registry operations are
//! fail-soft and never hand these to callers directly; they surface through
//! the HTTP API and through the observability hook.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache layer.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Operation referenced a namespace that was never configured
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    /// Key not found (or expired) in a namespace
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalidation pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Value could not be copied through its serialized form
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NamespaceNotFound(_) | CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidPattern(_) | CacheError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
