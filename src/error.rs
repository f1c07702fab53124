//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use crate::{models::api_key::KeyError, store::StoreError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Storage operation failed (connection error, query error, ...).
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// API key is missing, malformed, unknown, revoked, or expired.
    ///
    /// Returns HTTP 401 Unauthorized. The message is the same in every case
    /// so callers cannot tell which check failed.
    #[error("Invalid API key")]
    Unauthorized,

    /// Requested API key does not exist or belongs to another account.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    ApiKeyNotFound,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl From<KeyError> for AppError {
    fn from(err: KeyError) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "code": 401,
///   "error": "invalid_api_key",
///   "message": "Invalid API key"
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Unauthorized` → 401 Unauthorized
/// - `ApiKeyNotFound` → 404 Not Found
/// - `InvalidRequest` → 400 Bad Request
/// - `Store` → 500 Internal Server Error (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::ApiKeyNotFound => {
                (StatusCode::NOT_FOUND, "api_key_not_found", self.to_string())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Store(ref err) => {
                tracing::error!(error = %err, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "code": status.as_u16(),
            "error": error,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unauthorized_carries_numeric_code_and_message() {
        let (status, body) = render(AppError::Unauthorized).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);
        assert_eq!(body["error"], "invalid_api_key");
        assert_eq!(body["message"], "Invalid API key");
    }

    #[tokio::test]
    async fn invalid_request_exposes_details() {
        let (status, body) = render(AppError::InvalidRequest("name is required".into())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "name is required");
    }

    #[tokio::test]
    async fn key_errors_become_bad_requests() {
        let (status, body) = render(KeyError::EmptySecret.into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "API key secret must not be empty");
    }

    #[tokio::test]
    async fn storage_errors_hide_details() {
        let err = AppError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
    }
}
