//! # pahlawan-content-client: Typed Client for the Content API
//!
//! Path-addressed, version-tokened file storage behind one trait:
//!
//! - [`ContentStore::get_file`]: read a file and the version token that
//!   proves which revision was read.
//! - [`ContentStore::put_file`]: create a file (no token) or overwrite it
//!   conditionally on the token from a previous read.
//! - [`ContentStore::public_url`]: where readers fetch a stored file.
//!
//! Two implementations ship with the crate:
//!
//! - [`ContentsClient`]: HTTPS client for the GitHub contents API
//!   (`/repos/{owner}/{repo}/contents/{path}`), with bearer auth, an
//!   API-version header, and base64 file bodies.
//! - [`MemoryContentStore`]: in-process store with the same
//!   compare-and-swap semantics, for local runs and tests.
//!
//! ## Error Shape
//!
//! Every non-success response is translated into [`ContentApiError`],
//! carrying the upstream status and the upstream `message` field, so the
//! caller handles exactly one failure type. Stale or missing version
//! tokens surface as [`ContentApiError::VersionConflict`].

pub mod config;
pub mod contents;
pub mod error;
pub mod memory;
pub mod retry;
pub mod store;

pub use config::{ConfigError, ContentApiConfig};
pub use contents::ContentsClient;
pub use error::ContentApiError;
pub use memory::MemoryContentStore;
pub use retry::RetryPolicy;
pub use store::{ContentStore, PutFile, PutOutcome, RemoteFile, VersionToken};
