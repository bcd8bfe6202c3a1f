//! Content API client configuration.
//!
//! Identifies the repository (owner, name, branch) and the two base URLs:
//! the contents API used for reads and writes, and the raw-content host
//! that serves stored files publicly. Defaults point at GitHub.

use url::Url;
use zeroize::Zeroizing;

/// Default contents API base.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default raw-content base for public file URLs.
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Default branch when `GITHUB_BRANCH` is unset.
pub const DEFAULT_BRANCH: &str = "main";

/// Configuration for connecting to the content API.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct ContentApiConfig {
    /// Contents API base URL.
    pub api_base_url: Url,
    /// Raw-content base URL used to build public file URLs.
    pub raw_base_url: Url,
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch that reads and writes target.
    pub branch: String,
    /// Bearer token for API authentication. Zeroized on drop.
    pub api_token: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ContentApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentApiConfig")
            .field("api_base_url", &self.api_base_url)
            .field("raw_base_url", &self.raw_base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ContentApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `GITHUB_TOKEN` (required)
    /// - `GITHUB_OWNER` (required)
    /// - `GITHUB_REPO` (required)
    /// - `GITHUB_BRANCH` (default: `main`)
    /// - `GITHUB_API_URL` (default: `https://api.github.com`)
    /// - `GITHUB_RAW_URL` (default: `https://raw.githubusercontent.com`)
    /// - `CONTENT_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values count as absent. All missing required variables are
    /// reported together.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get("GITHUB_TOKEN");
        let owner = get("GITHUB_OWNER");
        let repo = get("GITHUB_REPO");

        let (Some(token), Some(owner), Some(repo)) = (token.clone(), owner.clone(), repo.clone()) else {
            let missing = [
                ("GITHUB_TOKEN", token.is_none()),
                ("GITHUB_OWNER", owner.is_none()),
                ("GITHUB_REPO", repo.is_none()),
            ]
            .into_iter()
            .filter_map(|(var, absent)| absent.then_some(var))
            .collect();
            return Err(ConfigError::Missing(missing));
        };

        Ok(Self {
            api_base_url: parse_url("GITHUB_API_URL", get("GITHUB_API_URL").as_deref().unwrap_or(DEFAULT_API_URL))?,
            raw_base_url: parse_url("GITHUB_RAW_URL", get("GITHUB_RAW_URL").as_deref().unwrap_or(DEFAULT_RAW_URL))?,
            owner,
            repo,
            branch: get("GITHUB_BRANCH").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            api_token: Zeroizing::new(token),
            timeout_secs: get("CONTENT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Create a configuration pointing at a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base_url` cannot be parsed.
    pub fn local_mock(base_url: &str, token: &str) -> Result<Self, ConfigError> {
        let url = parse_url("local_mock", base_url)?;
        Ok(Self {
            api_base_url: url.clone(),
            raw_base_url: url,
            owner: "pahlawan-owner".to_string(),
            repo: "pahlawan-repo".to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            api_token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
        })
    }

    /// Public raw-content URL of a stored path:
    /// `{raw_base}/{owner}/{repo}/{branch}/{path}`.
    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base_url.as_str().trim_end_matches('/'),
            self.owner,
            self.repo,
            self.branch,
            path.trim_start_matches('/'),
        )
    }
}

fn parse_url(var: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required variables are absent or blank.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    /// A URL variable does not parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    /// The token cannot be sent as an HTTP header value.
    #[error("GITHUB_TOKEN contains characters not allowed in an HTTP header")]
    InvalidToken,
}
