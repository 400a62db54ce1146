// src/error.rs

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate username)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Allows using `?` on database queries inside handlers.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Errors raised by the commerce services.
///
/// Services never know about HTTP; handlers turn these into [`AppError`].
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed or out-of-range input the caller can correct.
    #[error("{0}")]
    Validation(String),

    #[error("You cannot buy your own material")]
    SelfPurchase,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("{0}")]
    AccessDenied(String),

    #[error("Only buyers of this material can review it")]
    NotEntitled,

    #[error("You have already reviewed this material")]
    DuplicateReview,

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("file storage failure: {0}")]
    FileStorage(#[from] std::io::Error),
}

impl From<CommerceError> for AppError {
    fn from(err: CommerceError) -> Self {
        match err {
            CommerceError::Validation(_)
            | CommerceError::SelfPurchase
            | CommerceError::EmptyCart
            | CommerceError::InvalidRating(_) => AppError::BadRequest(err.to_string()),
            CommerceError::AccessDenied(_) | CommerceError::NotEntitled => {
                AppError::Forbidden(err.to_string())
            }
            CommerceError::DuplicateReview => AppError::Conflict(err.to_string()),
            CommerceError::NotFound(_) => AppError::NotFound(err.to_string()),
            CommerceError::Storage(_) | CommerceError::FileStorage(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

/// True when the database rejected a row because of a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
