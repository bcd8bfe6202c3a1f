//! # pahlawan-api: Image Upload Service
//!
//! Accepts an image as a base64 data URL, commits it to a content
//! repository, and keeps the shared index `data/pahlawan_uploads.json`
//! pointing each label at its latest image.
//!
//! ## API Surface
//!
//! | Route | Module | Purpose |
//! |-------|--------|---------|
//! | `POST /api/upload` | [`routes::upload`] | Store image, update index |
//! | `GET /health/liveness` | this module | Process is up |
//! | `GET /health/readiness` | this module | Content store configured |
//!
//! ## Middleware Stack
//!
//! ```text
//! TraceLayer → DefaultBodyLimit → Handler
//! ```

pub mod error;
pub mod extractors;
pub mod orchestration;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let api = routes::upload::router()
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    Router::new()
        .merge(health)
        .merge(api)
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Returns 200 "ready", or 503 when no content store
/// could be configured.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if !state.pipeline.is_configured() {
        return (StatusCode::SERVICE_UNAVAILABLE, "content store not configured").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}
