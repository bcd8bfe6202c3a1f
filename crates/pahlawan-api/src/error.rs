//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps upload pipeline failures to HTTP status codes and the flat
//! `{"error": "..."}` body callers expect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestration::UploadError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request input (400).
    #[error("{0}")]
    BadRequest(String),

    /// Request body exceeded the configured limit (413).
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Route exists but not for this method (405).
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Deployment is missing required configuration (500).
    #[error("{0}")]
    Configuration(String),

    /// The content store rejected a call or was unreachable (500).
    /// The upstream message is passed through.
    #[error("{0}")]
    Upstream(String),

    /// Any other failure (500).
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code for this error.
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Configuration(_) | Self::Upstream(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server-side errors for operator visibility.
        match &self {
            Self::Configuration(_) => tracing::error!(error = %self, "upload service misconfigured"),
            Self::Upstream(_) => tracing::error!(error = %self, "content store error"),
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::BadRequest(_) | Self::PayloadTooLarge(_) => {
                tracing::debug!(error = %self, "rejected request")
            }
            Self::MethodNotAllowed => {}
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match &err {
            UploadError::InvalidInput(_) => Self::BadRequest(err.to_string()),
            UploadError::Configuration(_) => Self::Configuration(err.to_string()),
            UploadError::ImageWrite { .. } | UploadError::IndexWrite { .. } => {
                Self::Upstream(err.to_string())
            }
            UploadError::Encode(_) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pahlawan_content_client::{ConfigError, ContentApiError};
    use pahlawan_core::ValidationError;

    /// Helper to extract status and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn invalid_input_is_400() {
        let err = AppError::from(UploadError::InvalidInput(ValidationError::MissingField("data_url")));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "data_url is required");
    }

    #[tokio::test]
    async fn missing_configuration_is_500() {
        let err = AppError::from(UploadError::Configuration(ConfigError::Missing(vec![
            "GITHUB_TOKEN",
        ])));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.error.contains("GITHUB_TOKEN"), "got {}", body.error);
    }

    #[tokio::test]
    async fn version_conflict_is_500_with_upstream_message() {
        let err = AppError::from(UploadError::IndexWrite {
            index_path: "data/pahlawan_uploads.json".into(),
            image_path: "images/a-1.png".into(),
            source: ContentApiError::VersionConflict {
                path: "data/pahlawan_uploads.json".into(),
                status: 409,
                message: "data/pahlawan_uploads.json does not match 3f2a".into(),
            },
        });
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.error.contains("does not match 3f2a"), "got {}", body.error);
        assert!(body.error.contains("images/a-1.png"), "got {}", body.error);
    }

    #[tokio::test]
    async fn method_not_allowed_body() {
        let (status, body) = response_parts(AppError::MethodNotAllowed).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body.error, "Method not allowed");
    }

    #[test]
    fn payload_too_large_status() {
        assert_eq!(
            AppError::PayloadTooLarge("too big".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }
}
