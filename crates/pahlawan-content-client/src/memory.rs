//! In-memory content store.
//!
//! Same contract as the contents API (create-if-absent, compare-and-swap on
//! the version token) without a network. Used for local development
//! (`CONTENT_STORE=memory`) and as the store behind orchestrator tests.
//!
//! Storage is a `parking_lot::RwLock<HashMap>`: the check-and-write of
//! `put_file` runs under one write guard, and no guard is held across an
//! `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::ContentApiError;
use crate::store::{ContentStore, PutFile, PutOutcome, RemoteFile, VersionToken};

/// Default prefix for public URLs of in-memory files.
pub const DEFAULT_PUBLIC_BASE: &str = "memory://pahlawan";

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    version: VersionToken,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicUsize,
    writes: AtomicUsize,
}

/// Thread-safe, cloneable in-memory [`ContentStore`].
///
/// All clones share the same files.
#[derive(Debug, Clone)]
pub struct MemoryContentStore {
    files: Arc<RwLock<HashMap<String, StoredFile>>>,
    counters: Arc<Counters>,
    public_base: String,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_public_base(DEFAULT_PUBLIC_BASE)
    }

    /// Create an empty store whose public URLs start with `base`.
    pub fn with_public_base(base: impl Into<String>) -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            public_base: base.into(),
        }
    }

    /// Current bytes at `path`.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files.read().get(path).map(|f| f.content.clone())
    }

    /// Current version token at `path`.
    pub fn version_of(&self, path: &str) -> Option<VersionToken> {
        self.files.read().get(path).map(|f| f.version.clone())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of `get_file` calls served, including misses.
    pub fn read_count(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    /// Number of `put_file` calls received, including rejected ones.
    pub fn write_count(&self) -> usize {
        self.counters.writes.load(Ordering::SeqCst)
    }

    fn version_for(content: &[u8]) -> VersionToken {
        VersionToken::new(format!("{:x}", Sha256::digest(content)))
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_file(&self, path: &str) -> Result<RemoteFile, ContentApiError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .read()
            .get(path)
            .map(|f| RemoteFile {
                content: f.content.clone(),
                version: f.version.clone(),
            })
            .ok_or_else(|| ContentApiError::NotFound {
                path: path.to_string(),
            })
    }

    async fn put_file(&self, file: &PutFile) -> Result<PutOutcome, ContentApiError> {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
        let mut files = self.files.write();

        let current = files.get(&file.path).map(|f| &f.version);
        match (current, &file.version) {
            (None, None) => {}
            (Some(current), Some(expected)) if current == expected => {}
            (Some(_), None) => {
                return Err(ContentApiError::VersionConflict {
                    path: file.path.clone(),
                    status: 422,
                    message: "\"sha\" wasn't supplied.".to_string(),
                });
            }
            (Some(current), Some(expected)) => {
                tracing::debug!(path = %file.path, %current, %expected, "stale version token");
                return Err(ContentApiError::VersionConflict {
                    path: file.path.clone(),
                    status: 409,
                    message: format!("{} is at {} but expected {}", file.path, current, expected),
                });
            }
            (None, Some(expected)) => {
                return Err(ContentApiError::VersionConflict {
                    path: file.path.clone(),
                    status: 409,
                    message: format!("{} does not exist at {}", file.path, expected),
                });
            }
        }

        let version = Self::version_for(&file.content);
        files.insert(
            file.path.clone(),
            StoredFile {
                content: file.content.clone(),
                version: version.clone(),
            },
        );
        tracing::debug!(path = %file.path, %version, bytes = file.content.len(), "stored file in memory");
        Ok(PutOutcome {
            version,
            commit_url: None,
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
