//! # Identifier Derivation
//!
//! Turns request fields into the names the content store sees:
//!
//! - [`derive_slug`]: free-text label → `[a-z0-9-]` slug.
//! - [`derive_extension`]: MIME hint / filename → file extension.
//! - [`parse_data_url`]: `data:<mime>;base64,<payload>` → [`DataUrl`].
//! - [`image_path`]: `images/<slug>-<suffix>.<ext>`.
//!
//! No validation that payload bytes match the claimed type is attempted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// Slug returned when a label contains no usable characters.
pub const FALLBACK_SLUG: &str = "pahlawan";

/// Extension used when neither the MIME hint nor the filename is recognised.
pub const DEFAULT_EXTENSION: &str = "png";

const SEPARATOR: char = '-';

/// Quote characters removed outright rather than turned into separators,
/// so `"Cut Nyak Dhien's"` becomes `cut-nyak-dhiens`.
const QUOTES: [char; 7] = ['\'', '"', '`', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}'];

/// MIME substring → extension, checked in order.
const MIME_EXTENSIONS: [(&str, &str); 5] = [
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("png", "png"),
    ("webp", "webp"),
    ("gif", "gif"),
];

/// Derive a filesystem-safe slug from a label.
///
/// Lowercases, strips quotes, collapses every run of characters outside
/// `[a-z0-9]` into one `-`, and trims separators from both ends. Returns
/// [`FALLBACK_SLUG`] when nothing survives.
pub fn derive_slug(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_separator = false;

    for c in label.to_lowercase().chars() {
        if QUOTES.contains(&c) {
            continue;
        }
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Pick a file extension from the MIME hint, then the filename, then
/// [`DEFAULT_EXTENSION`].
pub fn derive_extension(mime_hint: Option<&str>, filename: Option<&str>) -> String {
    if let Some(ext) = mime_hint.and_then(mime_extension) {
        return ext.to_string();
    }

    filename
        .and_then(filename_extension)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// The extension for a recognised image MIME type, matched by substring
/// and ignoring case.
pub fn mime_extension(mime: &str) -> Option<&'static str> {
    let mime = mime.to_ascii_lowercase();
    MIME_EXTENSIONS
        .iter()
        .find(|(needle, _)| mime.contains(needle))
        .map(|(_, ext)| *ext)
}

fn filename_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.trim().rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// A parsed `data:` URL with a base64 payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// The declared media type, exactly as written.
    pub mime: String,
    /// The base64 payload, exactly as written.
    pub payload: String,
}

impl DataUrl {
    /// Decode the base64 payload into raw bytes.
    ///
    /// ASCII whitespace inside the payload is ignored; browsers and some
    /// clients wrap long data URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidBase64`] if the payload does not
    /// decode with the standard alphabet.
    pub fn decode(&self) -> Result<Vec<u8>, ValidationError> {
        let compact: String = self
            .payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        BASE64
            .decode(compact.as_bytes())
            .map_err(|e| ValidationError::InvalidBase64(e.to_string()))
    }
}

/// Split a `data:<mime>;base64,<payload>` string into its parts.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedDataUrl`] when the prefix, the
/// `;base64,` marker, the media type, or the payload is missing.
pub fn parse_data_url(data_url: &str) -> Result<DataUrl, ValidationError> {
    let rest = data_url
        .trim()
        .strip_prefix("data:")
        .ok_or(ValidationError::MalformedDataUrl)?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or(ValidationError::MalformedDataUrl)?;
    if mime.is_empty() || payload.is_empty() {
        return Err(ValidationError::MalformedDataUrl);
    }
    Ok(DataUrl {
        mime: mime.to_string(),
        payload: payload.to_string(),
    })
}

/// Millisecond timestamp used to keep image paths unique per upload.
///
/// Best-effort only: two uploads for the same slug within the same
/// millisecond collide, and the second image write then fails.
pub fn unique_suffix(now: DateTime<Utc>) -> i64 {
    now.timestamp_millis()
}

/// Build the repository path for an uploaded image.
pub fn image_path(dir: &str, slug: &str, suffix: i64, ext: &str) -> String {
    format!("{}/{slug}-{suffix}.{ext}", dir.trim_end_matches('/'))
}
