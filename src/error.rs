/// Unified error types for the contest backend
use crate::{api::response::Envelope, token::TokenError, validation::FieldErrors};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Main error type for request handling and service setup
#[derive(Error, Debug)]
pub enum ApiError {
    /// Field-level input validation failures
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// Missing, invalid, expired or revoked credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Duplicate unique key (e.g. username)
    #[error("{0}")]
    Conflict(String),

    /// Unknown resource ID
    #[error("{0}")]
    NotFound(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Session store failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// Object storage, prober or transcoder failures
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Config(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Storage(msg) => ApiError::Storage(msg),
            TokenError::Signing(msg) => ApiError::Internal(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

/// Convert ApiError to the JSON envelope
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            ApiError::Validation(fields) => Envelope::validation(fields),
            ApiError::Unauthorized(_)
            | ApiError::Conflict(_)
            | ApiError::NotFound(_)
            | ApiError::RateLimited => Envelope::failure(self.to_string()),
            ApiError::Upstream(_) => {
                tracing::error!("Upstream failure: {}", self);
                Envelope::failure("Upstream service unavailable")
            }
            _ => {
                // Don't leak details
                tracing::error!("Request failed: {}", self);
                Envelope::failure("Internal server error")
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for backend operations
pub type ApiResult<T> = Result<T, ApiError>;
