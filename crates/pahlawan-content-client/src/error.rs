//! Content API client error types.

/// Errors from content store calls.
///
/// Every failure the orchestrator can see from the store has this one
/// shape. [`ContentApiError::status`] and [`ContentApiError::upstream_message`]
/// expose what the remote side reported, when it reported anything.
#[derive(Debug, thiserror::Error)]
pub enum ContentApiError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The requested file does not exist.
    #[error("{path} not found")]
    NotFound { path: String },
    /// The version token was stale, or missing for an existing file.
    #[error("version conflict writing {path} ({status}): {message}")]
    VersionConflict {
        path: String,
        status: u16,
        message: String,
    },
    /// The content API returned any other non-2xx status.
    #[error("content API {endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// A file body in a response could not be decoded.
    #[error("failed to decode content of {path}: {reason}")]
    Decode { path: String, reason: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ContentApiError {
    /// Upstream HTTP status, when the remote answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::VersionConflict { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::Http { source, .. } | Self::Deserialization { source, .. } => {
                source.status().map(|s| s.as_u16())
            }
            Self::Decode { .. } | Self::Config(_) => None,
        }
    }

    /// The message the remote side reported, when there was one.
    pub fn upstream_message(&self) -> Option<&str> {
        match self {
            Self::VersionConflict { message, .. } | Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether this is a stale/missing version token on write.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Whether the requested file was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
