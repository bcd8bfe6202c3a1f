//! # Custom Extractors
//!
//! Maps JSON body rejections onto [`AppError`] so malformed requests get
//! the same `{"error": "..."}` body as every other failure.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppError;

/// Extract a JSON body, mapping deserialization errors to
/// [`AppError::BadRequest`] and oversized bodies to
/// [`AppError::PayloadTooLarge`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    })
}
