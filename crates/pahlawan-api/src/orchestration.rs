//! # Upload Orchestration
//!
//! The only component with side-effect ordering responsibility. Each
//! upload runs this pipeline, short-circuiting on the first failure:
//!
//! 1. **Validate input**: `nama_pahlawan` and `data_url` present.
//! 2. **Validate configuration**: a content store was built from config.
//! 3. **Parse**: split and decode the data URL.
//! 4. **Derive**: extension, slug, `images/<slug>-<millis>.<ext>`.
//! 5. **Write image**: create-only; nothing is cleaned up on later failure.
//! 6. **Load index**: any read failure counts as "no index yet".
//! 7. **Reconcile**: upsert `{label, image_url, uploaded_at}`.
//! 8. **Write index**: conditional on the version token from step 6.
//! 9. **Respond**: label, image URL, index path, commit link.
//!
//! ## Concurrency
//!
//! Invocations share nothing in-process. Two uploads that read the same
//! index revision race on step 8; the loser gets a version conflict. Steps
//! 6–8 therefore run in a bounded loop: on conflict the index is re-read and
//! the upsert re-applied, up to [`UploadSettings::index_attempts`] times.
//! With `index_attempts = 1` a conflict is final and the image written in
//! step 5 stays in the repository unindexed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pahlawan_content_client::{
    ConfigError, ContentApiError, ContentStore, PutFile, PutOutcome, VersionToken,
};
use pahlawan_core::{
    decode_index, derive_extension, derive_slug, encode_index, image_path, mime_extension,
    parse_data_url,
    unique_suffix, upsert_record, IndexEntry, IndexRecord, ValidationError,
};
use thiserror::Error;

// -- Request / outcome --------------------------------------------------------

/// One upload as received from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    /// Label keying the index (`nama_pahlawan`).
    pub label: String,
    /// Original filename, used only as an extension hint.
    pub filename: Option<String>,
    /// Caller-declared MIME type, preferred over the data URL's own.
    pub mime_hint: Option<String>,
    /// `data:<mime>;base64,<payload>`.
    pub data_url: String,
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Label as stored in the index.
    pub label: String,
    /// Public URL of the new image.
    pub image_url: String,
    /// Repository path of the new image.
    pub image_path: String,
    /// Repository path of the index.
    pub index_path: String,
    /// Commit that carried the index write, when the store reports one.
    pub commit_url: Option<String>,
}

/// Failures of the upload pipeline, one variant per failing stage.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Missing or malformed request fields.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// The content store could not be configured.
    #[error("content store is not configured: {0}")]
    Configuration(ConfigError),

    /// Step 5 failed; nothing was written.
    #[error("failed to write image {path}: {source}")]
    ImageWrite {
        path: String,
        source: ContentApiError,
    },

    /// Step 8 failed; the image from step 5 is in the store but not indexed.
    #[error("failed to update index {index_path}; image {image_path} was stored but is not indexed: {source}")]
    IndexWrite {
        index_path: String,
        image_path: String,
        source: ContentApiError,
    },

    /// The reconciled index could not be serialized.
    #[error("failed to encode index: {0}")]
    Encode(#[from] serde_json::Error),
}

impl UploadError {
    /// The remote failure behind this error, if any.
    pub fn remote(&self) -> Option<&ContentApiError> {
        match self {
            Self::ImageWrite { source, .. } | Self::IndexWrite { source, .. } => Some(source),
            _ => None,
        }
    }
}

// -- Settings -----------------------------------------------------------------

/// Paths and retry behaviour of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Repository path of the shared index.
    pub index_path: String,
    /// Directory that receives images.
    pub image_dir: String,
    /// Total attempts at steps 6–8 before a version conflict is final.
    pub index_attempts: u32,
    /// Backoff unit between attempts; attempt `n` waits `n × retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            index_path: pahlawan_core::INDEX_PATH.to_string(),
            image_dir: pahlawan_core::IMAGE_DIR.to_string(),
            index_attempts: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

// -- Index loading ------------------------------------------------------------

/// The index as read, plus the token needed to overwrite it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    /// Decoded entries, in file order.
    pub entries: Vec<IndexEntry>,
    /// `None` when the index was absent or unreadable.
    pub version: Option<VersionToken>,
}

/// Fetch the index, treating every failure as "absent".
///
/// An index that exists but is not JSON also loads as absent. Its token is
/// dropped with it, so the following write is rejected by the store instead
/// of replacing the unreadable file.
pub async fn load_index_or_default(store: &dyn ContentStore, path: &str) -> IndexSnapshot {
    match store.get_file(path).await {
        Ok(file) => match decode_index(&file.content) {
            Ok(entries) => IndexSnapshot {
                entries,
                version: Some(file.version),
            },
            Err(e) => {
                tracing::warn!(path, error = %e, "index is not valid JSON; treating as absent");
                IndexSnapshot::default()
            }
        },
        Err(e) if e.is_not_found() => {
            tracing::debug!(path, "index does not exist yet");
            IndexSnapshot::default()
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "index read failed; treating as absent");
            IndexSnapshot::default()
        }
    }
}

// -- Pipeline -----------------------------------------------------------------

/// The upload orchestrator.
///
/// Holds the store as a `Result` so that a deployment missing its secrets
/// still starts and answers uploads with a configuration error, after
/// input validation has run.
#[derive(Clone)]
pub struct UploadPipeline {
    store: Result<Arc<dyn ContentStore>, ConfigError>,
    settings: UploadSettings,
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("store_configured", &self.store.is_ok())
            .field("settings", &self.settings)
            .finish()
    }
}

impl UploadPipeline {
    /// Create a pipeline over `store` (or the reason there is none).
    pub fn new(store: Result<Arc<dyn ContentStore>, ConfigError>, settings: UploadSettings) -> Self {
        Self { store, settings }
    }

    /// Whether uploads can reach a content store.
    pub fn is_configured(&self) -> bool {
        self.store.is_ok()
    }

    /// Run an upload stamped with the current time.
    pub async fn run(&self, request: UploadRequest) -> Result<UploadOutcome, UploadError> {
        self.run_at(request, Utc::now()).await
    }

    /// Run an upload stamped with `now`, which supplies both the image
    /// path suffix and the record's `uploaded_at`.
    pub async fn run_at(
        &self,
        request: UploadRequest,
        now: DateTime<Utc>,
    ) -> Result<UploadOutcome, UploadError> {
        let label = request.label.trim();
        if label.is_empty() {
            return Err(ValidationError::MissingField("nama_pahlawan").into());
        }
        if request.data_url.trim().is_empty() {
            return Err(ValidationError::MissingField("data_url").into());
        }

        let store = self
            .store
            .as_deref()
            .map_err(|e| UploadError::Configuration(e.clone()))?;

        let data_url = parse_data_url(&request.data_url)?;
        let image_bytes = data_url.decode()?;

        // An unrecognised declared type yields to the data URL's own.
        let declared = request.mime_hint.as_deref().filter(|m| mime_extension(m).is_some());
        let mime = declared.unwrap_or(&data_url.mime);
        let ext = derive_extension(Some(mime), request.filename.as_deref());
        let slug = derive_slug(label);
        let image_path = image_path(&self.settings.image_dir, &slug, unique_suffix(now), &ext);

        tracing::info!(label, %image_path, bytes = image_bytes.len(), "storing uploaded image");
        store
            .put_file(&PutFile {
                path: image_path.clone(),
                content: image_bytes,
                message: format!("Upload image for {label}"),
                version: None,
            })
            .await
            .map_err(|source| UploadError::ImageWrite {
                path: image_path.clone(),
                source,
            })?;

        let image_url = store.public_url(&image_path);
        let record = IndexRecord::new(label, image_url.clone(), now);
        let written = self.commit_index(store, record, &image_path).await?;

        tracing::info!(label, %image_url, index_path = %self.settings.index_path, "upload indexed");
        Ok(UploadOutcome {
            label: label.to_string(),
            image_url,
            image_path,
            index_path: self.settings.index_path.clone(),
            commit_url: written.commit_url,
        })
    }

    /// Steps 6–8 under bounded optimistic retry.
    async fn commit_index(
        &self,
        store: &dyn ContentStore,
        record: IndexRecord,
        image_path: &str,
    ) -> Result<PutOutcome, UploadError> {
        let index_path = self.settings.index_path.as_str();
        let max_attempts = self.settings.index_attempts.max(1);
        let mut attempt = 1;

        loop {
            let snapshot = load_index_or_default(store, index_path).await;
            let entries = upsert_record(snapshot.entries, record.clone());
            let put = PutFile {
                path: index_path.to_string(),
                content: encode_index(&entries)?,
                message: format!("Update index for {}", record.label),
                version: snapshot.version,
            };

            match store.put_file(&put).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_version_conflict() && attempt < max_attempts => {
                    tracing::warn!(
                        index_path,
                        attempt,
                        max_attempts,
                        error = %e,
                        "index changed since it was read; re-reading"
                    );
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(source) => {
                    tracing::error!(
                        index_path,
                        image_path,
                        attempt,
                        error = %source,
                        "index write failed; image left unindexed"
                    );
                    return Err(UploadError::IndexWrite {
                        index_path: index_path.to_string(),
                        image_path: image_path.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use chrono::TimeZone;
    use pahlawan_content_client::{MemoryContentStore, RemoteFile};
    use std::sync::atomic::{AtomicBool, Ordering};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn settings(attempts: u32) -> UploadSettings {
        UploadSettings {
            index_attempts: attempts,
            retry_backoff: Duration::ZERO,
            ..UploadSettings::default()
        }
    }

    fn pipeline(store: Arc<dyn ContentStore>, attempts: u32) -> UploadPipeline {
        UploadPipeline::new(Ok(store), settings(attempts))
    }

    fn request(label: &str) -> UploadRequest {
        UploadRequest {
            label: label.to_string(),
            filename: Some("foto.png".to_string()),
            mime_hint: Some("image/png".to_string()),
            data_url: format!("data:image/png;base64,{}", BASE64.encode(PNG)),
        }
    }

    fn index_of(store: &MemoryContentStore) -> Vec<IndexEntry> {
        decode_index(&store.read(pahlawan_core::INDEX_PATH).unwrap()).unwrap()
    }

    fn only_record(entries: &[IndexEntry]) -> &IndexRecord {
        assert_eq!(entries.len(), 1, "expected exactly one entry: {entries:?}");
        match &entries[0] {
            IndexEntry::Record(r) => r,
            other => panic!("expected record, got {other:?}"),
        }
    }

    /// Commits a competing index write right before the first index PUT it
    /// forwards, so that PUT carries a stale token.
    struct RacingStore {
        inner: MemoryContentStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl ContentStore for RacingStore {
        async fn get_file(&self, path: &str) -> Result<RemoteFile, ContentApiError> {
            self.inner.get_file(path).await
        }

        async fn put_file(&self, file: &PutFile) -> Result<PutOutcome, ContentApiError> {
            if file.path == pahlawan_core::INDEX_PATH && !self.raced.swap(true, Ordering::SeqCst) {
                let rival = IndexRecord::new("Pahlawan Rival", "memory://rival.png", at(1));
                let current = self.inner.version_of(&file.path);
                let entries = match self.inner.read(&file.path) {
                    Some(bytes) => decode_index(&bytes).unwrap(),
                    None => Vec::new(),
                };
                self.inner
                    .put_file(&PutFile {
                        path: file.path.clone(),
                        content: encode_index(&upsert_record(entries, rival)).unwrap(),
                        message: "rival".into(),
                        version: current,
                    })
                    .await
                    .unwrap();
            }
            self.inner.put_file(file).await
        }

        fn public_url(&self, path: &str) -> String {
            self.inner.public_url(path)
        }
    }

    /// Fails every read with a 500.
    struct BrokenReads(MemoryContentStore);

    #[async_trait]
    impl ContentStore for BrokenReads {
        async fn get_file(&self, _path: &str) -> Result<RemoteFile, ContentApiError> {
            Err(ContentApiError::Api {
                endpoint: "GET contents".into(),
                status: 500,
                message: "Server Error".into(),
            })
        }

        async fn put_file(&self, file: &PutFile) -> Result<PutOutcome, ContentApiError> {
            self.0.put_file(file).await
        }

        fn public_url(&self, path: &str) -> String {
            self.0.public_url(path)
        }
    }

    #[tokio::test]
    async fn first_upload_creates_index_with_one_record() {
        let store = MemoryContentStore::new();
        let outcome = pipeline(Arc::new(store.clone()), 3)
            .run_at(request("Pahlawan A"), at(1_700_000_000_123))
            .await
            .unwrap();

        assert_eq!(outcome.image_path, "images/pahlawan-a-1700000000123.png");
        assert_eq!(outcome.image_url, "memory://pahlawan/images/pahlawan-a-1700000000123.png");
        assert_eq!(outcome.index_path, "data/pahlawan_uploads.json");
        assert_eq!(store.read(&outcome.image_path).unwrap(), PNG);

        let entries = index_of(&store);
        let record = only_record(&entries);
        assert_eq!(record.label, "Pahlawan A");
        assert_eq!(record.image_url, outcome.image_url);
        assert_eq!(record.uploaded_at, "2023-11-14T22:13:20.123Z");
    }

    #[tokio::test]
    async fn second_upload_with_other_case_replaces_record() {
        let store = MemoryContentStore::new();
        let pipeline = pipeline(Arc::new(store.clone()), 3);

        let first = pipeline.run_at(request("Pahlawan A"), at(1_000)).await.unwrap();
        let second = pipeline.run_at(request("pahlawan a"), at(2_000)).await.unwrap();
        assert_ne!(first.image_url, second.image_url);

        let entries = index_of(&store);
        let record = only_record(&entries);
        assert_eq!(record.label, "pahlawan a");
        assert_eq!(record.image_url, second.image_url);
        assert_eq!(record.uploaded_at, "1970-01-01T00:00:02.000Z");

        // Both image objects remain; images are never deleted.
        assert!(store.read(&first.image_path).is_some());
        assert!(store.read(&second.image_path).is_some());
    }

    #[tokio::test]
    async fn missing_data_url_makes_no_remote_calls() {
        let store = MemoryContentStore::new();
        let mut req = request("Pahlawan A");
        req.data_url = String::new();

        let err = pipeline(Arc::new(store.clone()), 3).run(req).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::InvalidInput(ValidationError::MissingField("data_url"))
        ));
        assert_eq!(store.read_count(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn blank_label_is_invalid_input() {
        let store = MemoryContentStore::new();
        let err = pipeline(Arc::new(store), 3).run(request("   ")).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::InvalidInput(ValidationError::MissingField("nama_pahlawan"))
        ));
    }

    #[tokio::test]
    async fn input_is_validated_before_configuration() {
        let unconfigured = UploadPipeline::new(
            Err(ConfigError::Missing(vec!["GITHUB_TOKEN"])),
            UploadSettings::default(),
        );
        let mut req = request("Pahlawan A");
        req.data_url = String::new();
        assert!(matches!(
            unconfigured.run(req).await.unwrap_err(),
            UploadError::InvalidInput(_)
        ));

        let err = unconfigured.run(request("Pahlawan A")).await.unwrap_err();
        assert!(matches!(err, UploadError::Configuration(ConfigError::Missing(_))));
    }

    #[tokio::test]
    async fn malformed_data_url_is_invalid_input_and_writes_nothing() {
        let store = MemoryContentStore::new();
        let mut req = request("Pahlawan A");
        req.data_url = "image/png;base64,AAAA".into();

        let err = pipeline(Arc::new(store.clone()), 3).run(req).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::InvalidInput(ValidationError::MalformedDataUrl)
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn extension_falls_back_to_data_url_mime() {
        let store = MemoryContentStore::new();
        let req = UploadRequest {
            label: "Bung Tomo".into(),
            filename: None,
            mime_hint: None,
            data_url: format!("data:image/webp;base64,{}", BASE64.encode(b"RIFF")),
        };
        let outcome = pipeline(Arc::new(store), 3).run_at(req, at(5)).await.unwrap();
        assert_eq!(outcome.image_path, "images/bung-tomo-5.webp");
    }

    #[tokio::test]
    async fn unrecognised_declared_mime_yields_to_data_url_mime() {
        let store = MemoryContentStore::new();
        let req = UploadRequest {
            label: "Bung Tomo".into(),
            filename: Some("tomo.heic".into()),
            mime_hint: Some("image/heic".into()),
            data_url: format!("data:image/webp;base64,{}", BASE64.encode(b"RIFF")),
        };
        let outcome = pipeline(Arc::new(store), 3).run_at(req, at(6)).await.unwrap();
        assert_eq!(outcome.image_path, "images/bung-tomo-6.webp");
    }

    #[tokio::test]
    async fn filename_used_when_no_mime_is_recognised() {
        let store = MemoryContentStore::new();
        let req = UploadRequest {
            label: "Bung Tomo".into(),
            filename: Some("tomo.heic".into()),
            mime_hint: Some("image/heic".into()),
            data_url: format!("data:image/heic;base64,{}", BASE64.encode(b"ftyp")),
        };
        let outcome = pipeline(Arc::new(store), 3).run_at(req, at(7)).await.unwrap();
        assert_eq!(outcome.image_path, "images/bung-tomo-7.heic");
    }

    #[tokio::test]
    async fn stale_token_without_retry_orphans_the_image() {
        let inner = MemoryContentStore::new();
        let store = Arc::new(RacingStore {
            inner: inner.clone(),
            raced: AtomicBool::new(false),
        });

        let err = pipeline(store, 1)
            .run_at(request("Pahlawan A"), at(42))
            .await
            .unwrap_err();

        match &err {
            UploadError::IndexWrite { image_path, source, .. } => {
                assert!(source.is_version_conflict());
                // The image write already succeeded: it is orphaned.
                assert_eq!(inner.read(image_path).unwrap(), PNG);
            }
            other => panic!("expected IndexWrite, got {other:?}"),
        }

        let entries = index_of(&inner);
        assert_eq!(only_record(&entries).label, "Pahlawan Rival");
    }

    #[tokio::test]
    async fn stale_token_with_retry_keeps_both_records() {
        let inner = MemoryContentStore::new();
        let store = Arc::new(RacingStore {
            inner: inner.clone(),
            raced: AtomicBool::new(false),
        });

        pipeline(store, 3)
            .run_at(request("Pahlawan A"), at(42))
            .await
            .unwrap();

        let labels: Vec<_> = index_of(&inner)
            .iter()
            .filter_map(|e| e.label().map(str::to_string))
            .collect();
        assert_eq!(labels, vec!["Pahlawan Rival", "Pahlawan A"]);
    }

    #[tokio::test]
    async fn failed_index_read_is_treated_as_absent() {
        let inner = MemoryContentStore::new();
        let store = Arc::new(BrokenReads(inner.clone()));

        pipeline(store, 3)
            .run_at(request("Pahlawan A"), at(7))
            .await
            .unwrap();

        assert_eq!(only_record(&index_of(&inner)).label, "Pahlawan A");
    }

    #[tokio::test]
    async fn unreadable_index_is_not_overwritten() {
        let store = MemoryContentStore::new();
        store
            .put_file(&PutFile {
                path: pahlawan_core::INDEX_PATH.into(),
                content: b"not json".to_vec(),
                message: "seed".into(),
                version: None,
            })
            .await
            .unwrap();

        let err = pipeline(Arc::new(store.clone()), 2)
            .run_at(request("Pahlawan A"), at(9))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::IndexWrite { .. }));
        assert_eq!(store.read(pahlawan_core::INDEX_PATH).unwrap(), b"not json");
    }

    #[tokio::test]
    async fn image_path_collision_fails_before_touching_index() {
        let store = MemoryContentStore::new();
        let pipeline = pipeline(Arc::new(store.clone()), 3);
        pipeline.run_at(request("Pahlawan A"), at(100)).await.unwrap();
        let index_before = store.read(pahlawan_core::INDEX_PATH);

        let err = pipeline.run_at(request("Pahlawan A"), at(100)).await.unwrap_err();
        assert!(matches!(err, UploadError::ImageWrite { .. }));
        assert!(err.remote().unwrap().is_version_conflict());
        assert_eq!(store.read(pahlawan_core::INDEX_PATH), index_before);
    }
}
