use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::auth::PasswordError;
use crate::response::ApiResponse;
use crate::storage::StorageError;

/// Errors surfaced to HTTP callers, each with a fixed status code
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or empty required input
    #[error("{0}")]
    Validation(String),

    /// Duplicate username or email
    #[error("{0}")]
    Conflict(String),

    /// Bad credentials or a bad, expired or superseded token
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// Media host or store unreachable
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiResponse::new(status, serde_json::Value::Null, self.to_string());
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UserNotFound(_) => ApiError::NotFound("User does not exist".to_string()),
            StorageError::DuplicateUser(_) => {
                ApiError::Conflict("User with email or username already exists".to_string())
            }
            StorageError::Database(e) => {
                error!("Database error: {}", e);
                ApiError::Upstream("Database unavailable".to_string())
            }
            StorageError::Internal(e) => {
                error!("Storage error: {}", e);
                ApiError::Internal("Internal error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        error!("Password hashing error: {}", e);
        ApiError::Internal("Internal error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Upstream("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_error_mapping() {
        let dup: ApiError = StorageError::DuplicateUser("alice".into()).into();
        assert!(matches!(dup, ApiError::Conflict(_)));

        let missing: ApiError = StorageError::UserNotFound(Uuid::new_v4()).into();
        assert!(matches!(missing, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_error_body_uses_envelope() {
        let response = ApiError::unauthorized("Invalid access token").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["statusCode"], 401);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid access token");
        assert!(body["data"].is_null());
    }
}
