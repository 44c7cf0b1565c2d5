//! Error types for Bookshelf server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::validation::FieldErrors;

/// Stable error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    NotAuthorized = 3,
    DbFailure = 4,
    NoSuchData = 5,
    BadValue = 6,
    Referenced = 7,
    ConcurrencyConflict = 8,
    AlreadyReturned = 9,
    PartialUpdate = 10,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Borrowing {0} has already been returned")]
    AlreadyReturned(i32),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Partial update rolled back: {0}")]
    PartialUpdate(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation error carrying a single field message
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), message.into());
        AppError::Validation(errors)
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    /// Field-level validation messages, keyed by field name
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub fields: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut fields = None;
        let (status, code, message) = match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthenticated, msg)
            }
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg),
            AppError::Validation(errors) => {
                fields = Some(errors);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorCode::BadValue,
                    "One or more fields are invalid".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::ConcurrencyConflict(msg) => (
                StatusCode::CONFLICT,
                ErrorCode::ConcurrencyConflict,
                format!("{}. Reload the record and try again.", msg),
            ),
            AppError::AlreadyReturned(id) => (
                StatusCode::CONFLICT,
                ErrorCode::AlreadyReturned,
                format!("Borrowing {} has already been returned", id),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Referenced, msg),
            AppError::PartialUpdate(msg) => {
                tracing::error!("Partial update rolled back: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::PartialUpdate,
                    "The changes could not be saved".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            fields,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
