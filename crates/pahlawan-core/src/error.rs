//! # Validation Errors
//!
//! Structured input errors built with `thiserror`. Every variant maps to
//! a 400 response at the HTTP boundary.

use thiserror::Error;

/// The request (or a field derived from it) is missing or malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The data URL does not have the `data:<mime>;base64,<payload>` shape.
    #[error("data_url must look like data:<mime>;base64,<payload>")]
    MalformedDataUrl,

    /// The data URL payload is not valid base64.
    #[error("data_url payload is not valid base64: {0}")]
    InvalidBase64(String),
}
