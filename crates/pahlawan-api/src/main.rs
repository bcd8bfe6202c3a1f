//! # pahlawan-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the upload service.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use pahlawan_api::state::{AppConfig, AppState, StoreKind};
use pahlawan_content_client::{
    ConfigError, ContentApiConfig, ContentStore, ContentsClient, MemoryContentStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env();
    tracing::debug!(?config, "loaded configuration");

    let store: Result<Arc<dyn ContentStore>, ConfigError> = match config.store_kind {
        StoreKind::Memory => {
            tracing::warn!("using in-memory content store; uploads are lost on restart");
            Ok(Arc::new(MemoryContentStore::new()))
        }
        StoreKind::GitHub => match ContentApiConfig::from_env() {
            Ok(content_config) => {
                tracing::info!(
                    owner = %content_config.owner,
                    repo = %content_config.repo,
                    branch = %content_config.branch,
                    "content API client configured"
                );
                match ContentsClient::new(content_config) {
                    Ok(client) => Ok(Arc::new(client)),
                    Err(e) => {
                        tracing::error!("Failed to create content API client: {e}");
                        return Err(e.into());
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Content API client not configured: {e}. Uploads will return 500.");
                Err(e)
            }
        },
    };

    let port = config.port;
    let app = pahlawan_api::app(AppState::new(config, store));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("pahlawan API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
