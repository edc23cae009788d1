//! Error types and HTTP error response handling.
//!
//! This module defines the error taxonomy seen by callers of the bulk
//! transfer service and how each kind is converted into an HTTP response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::account::ValidationError;
use crate::models::transfer::InvalidAmount;
use crate::storage::StorageError;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Client Errors**: Malformed uploads, unparsable amounts, failed validation
/// - **Business Rule Errors**: Insufficient funds, unknown account
/// - **Storage Errors**: Fatal storage failures and exhausted retries
/// - **Cancellation**: The caller went away or the server is shutting down
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body or upload could not be read or decoded.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("{0}")]
    InvalidRequest(String),

    /// A decimal amount in the request could not be parsed.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error(transparent)]
    InvalidAmount(#[from] InvalidAmount),

    /// A required field is missing or an amount is out of range.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No bank account matches the requested IBAN.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Account not found")]
    AccountNotFound,

    /// The account balance does not cover the sum of the transfers.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds")]
    InsufficientFunds { required: i64, available: i64 },

    /// A non-retryable storage failure.
    ///
    /// Returns HTTP 500 Internal Server Error (hides details from client).
    #[error("storage failure during {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    /// Retryable storage failures persisted past the configured attempt limit.
    ///
    /// Returns HTTP 500 Internal Server Error (hides details from client).
    #[error("bulk transfer failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    /// Cancelled while waiting to retry or during a storage call.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("Request cancelled")]
    Cancelled,
}

impl AppError {
    /// Wrap a storage failure, mapping a missing account to `AccountNotFound`.
    pub fn storage(operation: &'static str, source: StorageError) -> Self {
        match source {
            StorageError::NotFound { .. } => AppError::AccountNotFound,
            source => AppError::Storage { operation, source },
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `InvalidRequest` → 400 Bad Request
/// - `InvalidAmount` → 400 Bad Request
/// - `Validation` → 400 Bad Request
/// - `AccountNotFound` → 404 Not Found
/// - `InsufficientFunds` → 422 Unprocessable Entity
/// - `Cancelled` → 503 Service Unavailable
/// - `Storage`, `RetryExhausted` → 500 Internal Server Error
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::InvalidAmount(_) => {
                (StatusCode::BAD_REQUEST, "invalid_amount", self.to_string())
            }
            AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "validation_error", self.to_string())
            }
            AppError::AccountNotFound => {
                (StatusCode::NOT_FOUND, "account_not_found", self.to_string())
            }
            AppError::InsufficientFunds { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_funds",
                self.to_string(),
            ),
            AppError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "cancelled",
                self.to_string(),
            ),
            AppError::Storage { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
            AppError::RetryExhausted { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Error processing bulk transfer".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
