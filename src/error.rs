//! HTTP-facing error type.
//!
//! Handlers return `Result<_, ApiError>`. Storage and auth code keep using
//! `anyhow`, and `?` converts on the way out: SQLite lock timeouts become
//! [`ApiError::Unavailable`], everything else [`ApiError::Internal`].

use crate::db;
use crate::uploads::UPLOAD_TOO_LARGE;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    BadRequest(String),
    /// No session, or the session's role may not call this endpoint.
    #[error("{0}")]
    Unauthorized(String),
    /// Absent, or not owned by the caller. The two are never told apart.
    #[error("{0}")]
    NotFound(String),
    /// Request body over the configured limit.
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Storage timed out waiting for a lock.
    #[error("storage unavailable: {0:#}")]
    Unavailable(anyhow::Error),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized".to_string())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if db::is_busy(&err) {
            ApiError::Unavailable(err)
        } else {
            ApiError::Internal(err)
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(anyhow::Error::new(err).context("Blocking task failed"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge(rejection.body_text());
        }
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge(UPLOAD_TOO_LARGE.to_string());
        }
        ApiError::BadRequest(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::BadRequest(message)
            | ApiError::Unauthorized(message)
            | ApiError::NotFound(message)
            | ApiError::PayloadTooLarge(message) => json!({ "error": message }),
            ApiError::Unavailable(err) => {
                tracing::error!("storage unavailable: {err:#}");
                json!({ "error": "Service temporarily unavailable", "detail": err.to_string() })
            }
            ApiError::Internal(err) => {
                tracing::error!("request failed: {err:#}");
                json!({ "error": "Internal server error", "detail": err.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}
