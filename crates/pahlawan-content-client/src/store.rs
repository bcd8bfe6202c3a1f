//! The content store seam.
//!
//! [`ContentStore`] is object-safe so the API layer can hold an
//! `Arc<dyn ContentStore>` and swap the GitHub client for the in-memory
//! store without generics leaking into handlers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ContentApiError;

/// Opaque proof of which revision of a file was read.
///
/// For GitHub this is the blob SHA; for [`crate::MemoryContentStore`] it
/// is the SHA-256 of the content. Callers never inspect it, they only hand
/// it back on the next write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a token string as issued by the store.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Decoded file bytes.
    pub content: Vec<u8>,
    /// Revision these bytes belong to.
    pub version: VersionToken,
}

/// A write request.
#[derive(Debug, Clone)]
pub struct PutFile {
    /// Repository-relative path.
    pub path: String,
    /// Raw file bytes; the client handles transfer encoding.
    pub content: Vec<u8>,
    /// Commit message.
    pub message: String,
    /// `None` creates the file and fails if it exists; `Some` overwrites
    /// only if the file is still at that revision.
    pub version: Option<VersionToken>,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    /// Revision of the file as written.
    pub version: VersionToken,
    /// Link to the commit that carried the write, if the store has one.
    pub commit_url: Option<String>,
}

/// Path-addressed file storage with optimistic concurrency.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read `path`.
    ///
    /// Fails with [`ContentApiError::NotFound`] if absent.
    async fn get_file(&self, path: &str) -> Result<RemoteFile, ContentApiError>;

    /// Create or conditionally overwrite a file.
    ///
    /// Fails with [`ContentApiError::VersionConflict`] when the supplied
    /// token is stale, or when no token is supplied for an existing file.
    async fn put_file(&self, file: &PutFile) -> Result<PutOutcome, ContentApiError>;

    /// Public URL of a stored path.
    fn public_url(&self, path: &str) -> String;
}
