#![deny(missing_docs)]

//! # pahlawan-core: Pure Building Blocks for the Upload Service
//!
//! Everything in this crate is side-effect free. The remote content store
//! lives in `pahlawan-content-client`; sequencing lives in `pahlawan-api`.
//!
//! ## Modules
//!
//! - [`ident`]: label → slug, MIME/filename → extension, data URL parsing.
//! - [`index`]: the shared JSON index: decoding, case-insensitive upsert,
//!   pretty-printed encoding.
//! - [`error`]: [`ValidationError`], the `InvalidInput` failure shape.
//!
//! ## Design Principles
//!
//! 1. **Build a new sequence, never mutate in place.** [`upsert_record`]
//!    consumes the loaded entries and returns the replacement sequence; the
//!    caller commits it conditionally on the version token it read.
//!
//! 2. **Never drop foreign data.** Index entries that do not look like
//!    records, and unknown fields on records, survive a rewrite verbatim.

pub mod error;
pub mod ident;
pub mod index;

pub use error::ValidationError;
pub use ident::{
    derive_extension, derive_slug, image_path, mime_extension, parse_data_url, unique_suffix, DataUrl,
};
pub use index::{decode_index, encode_index, upsert_record, IndexEntry, IndexRecord};

/// Repository path of the shared label → image index.
pub const INDEX_PATH: &str = "data/pahlawan_uploads.json";

/// Repository directory that receives uploaded images.
pub const IMAGE_DIR: &str = "images";
