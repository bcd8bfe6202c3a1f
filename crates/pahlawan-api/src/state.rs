//! # Application State
//!
//! Configuration read once at startup and the shared state handed to every
//! handler. The upload pipeline itself is stateless between requests; the
//! only cross-request state lives in the content store.

use std::sync::Arc;
use std::time::Duration;

use pahlawan_content_client::{ConfigError, ContentStore};

use crate::orchestration::{UploadPipeline, UploadSettings};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default request body limit (10 MiB). Images travel base64-encoded
/// inside JSON, so the limit applies to the encoded form.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Which content store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// GitHub contents API, configured by `GITHUB_*`.
    #[default]
    GitHub,
    /// Process-local in-memory store. Nothing survives a restart.
    Memory,
}

impl StoreKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "github" => Some(Self::GitHub),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
    /// Content store backend.
    pub store_kind: StoreKind,
    /// Pipeline paths and index retry behaviour.
    pub upload: UploadSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            store_kind: StoreKind::default(),
            upload: UploadSettings::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `PORT` | `8080` |
    /// | `MAX_BODY_BYTES` | `10485760` |
    /// | `CONTENT_STORE` | `github` |
    /// | `INDEX_WRITE_ATTEMPTS` | `3` |
    /// | `INDEX_RETRY_BACKOFF_MS` | `100` |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let store_kind = match lookup("CONTENT_STORE") {
            None => defaults.store_kind,
            Some(raw) => StoreKind::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "unknown CONTENT_STORE; using github");
                StoreKind::GitHub
            }),
        };

        let upload = UploadSettings {
            index_attempts: parsed(&lookup, "INDEX_WRITE_ATTEMPTS")
                .filter(|n: &u32| *n >= 1)
                .unwrap_or(defaults.upload.index_attempts),
            retry_backoff: parsed(&lookup, "INDEX_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.upload.retry_backoff),
            ..defaults.upload
        };

        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            max_body_bytes: parsed(&lookup, "MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            store_kind,
            upload,
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<T> {
    lookup(var).and_then(|raw| raw.trim().parse().ok())
}

/// Shared application state, cloned into every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Startup configuration.
    pub config: AppConfig,
    /// The upload orchestrator.
    pub pipeline: Arc<UploadPipeline>,
}

impl AppState {
    /// Build state over a content store, or over the reason there is none.
    pub fn new(config: AppConfig, store: Result<Arc<dyn ContentStore>, ConfigError>) -> Self {
        let pipeline = UploadPipeline::new(store, config.upload.clone());
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }

    /// State over a configured store with default configuration.
    pub fn with_store(store: Arc<dyn ContentStore>) -> Self {
        Self::new(AppConfig::default(), Ok(store))
    }
}
