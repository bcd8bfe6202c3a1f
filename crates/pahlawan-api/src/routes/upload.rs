//! # Upload Route
//!
//! - `POST /api/upload`: decode a data-URL image, store it, and point the
//!   shared index entry for its label at the new file.
//!
//! Any other method on the path answers 405 `{"error":"Method not allowed"}`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::orchestration::{UploadOutcome, UploadRequest};
use crate::state::AppState;

/// Assemble the upload router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/upload", post(upload).fallback(method_not_allowed))
}

/// Request body. Every field is optional at the wire level so that a
/// missing field is reported as a validation error rather than a parse
/// error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadBody {
    /// Label the image is indexed under.
    #[serde(default)]
    pub nama_pahlawan: Option<String>,
    /// Original filename; only its extension is used.
    #[serde(default)]
    pub filename: Option<String>,
    /// Declared MIME type.
    #[serde(default)]
    pub mime: Option<String>,
    /// `data:<mime>;base64,<payload>`.
    #[serde(default)]
    pub data_url: Option<String>,
}

impl From<UploadBody> for UploadRequest {
    fn from(body: UploadBody) -> Self {
        Self {
            label: body.nama_pahlawan.unwrap_or_default(),
            filename: body.filename,
            mime_hint: body.mime.filter(|m| !m.trim().is_empty()),
            data_url: body.data_url.unwrap_or_default(),
        }
    }
}

/// Successful upload response.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Always `true`.
    pub ok: bool,
    /// Label as stored in the index.
    pub nama_pahlawan: String,
    /// Public URL of the stored image.
    pub image_url: String,
    /// Repository path of the index file.
    pub json_path: String,
    /// Commit carrying the index update, if the store reports one.
    pub commit_url: Option<String>,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            ok: true,
            nama_pahlawan: outcome.label,
            image_url: outcome.image_url,
            json_path: outcome.index_path,
            commit_url: outcome.commit_url,
        }
    }
}

/// POST /api/upload
async fn upload(
    State(state): State<AppState>,
    body: Result<Json<UploadBody>, JsonRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let body = extract_json(body)?;
    let outcome = state.pipeline.run(body.into()).await?;
    Ok(Json(outcome.into()))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
