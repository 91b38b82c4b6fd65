use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::ServiceError;
use crate::services::media_store::MediaError;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 401 Unauthorized
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication required")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidFile(_) => AppError::bad_request(err.to_string()),
            ServiceError::QuotaExceeded { .. } => {
                AppError::new(StatusCode::INSUFFICIENT_STORAGE, err.to_string())
            }
            ServiceError::UploadFailed(source) => {
                tracing::error!("media store upload failed: {}", source);
                AppError::new(StatusCode::BAD_GATEWAY, "media upload failed")
            }
            ServiceError::NotFoundOrForbidden(what) => {
                AppError::not_found(format!("{what} not found"))
            }
            ServiceError::Sqlx(source) => {
                tracing::error!("database error: {}", source);
                AppError::internal("internal error")
            }
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidKey => AppError::bad_request("invalid media key"),
            MediaError::NotFound(key) => AppError::not_found(format!("media `{key}` not found")),
            MediaError::Io(source) => {
                tracing::error!("media store io error: {}", source);
                AppError::internal("internal error")
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::bad_request(format!("malformed multipart request: {err}"))
    }
}
