//! Typed client for the GitHub contents API.
//!
//! Base URL: `api.github.com` (override with `GITHUB_API_URL`)
//!
//! ## Paths
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/repos/{owner}/{repo}/contents/{path}?ref={branch}` | Read file + blob SHA |
//! | PUT    | `/repos/{owner}/{repo}/contents/{path}` | Create / conditionally update |
//!
//! File bodies travel base64-encoded in both directions. The blob `sha`
//! is the version token: a PUT carrying a stale `sha` is answered with
//! 409, a PUT without `sha` for an existing file with 422.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::{ConfigError, ContentApiConfig};
use crate::error::ContentApiError;
use crate::retry::{retry_send, RetryPolicy};
use crate::store::{ContentStore, PutFile, PutOutcome, RemoteFile, VersionToken};

/// Value sent in the `X-GitHub-Api-Version` header.
pub const API_VERSION: &str = "2022-11-28";

const API_VERSION_HEADER: &str = "x-github-api-version";

// -- Types matching the contents API schemas ----------------------------------

/// File object returned by `GET contents/{path}`.
#[derive(Debug, Clone, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Body of `PUT contents/{path}`.
#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct PutContentsResponse {
    content: CommittedContent,
    #[serde(default)]
    commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct CommittedContent {
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CommitInfo {
    #[serde(default)]
    html_url: Option<String>,
}

/// Error body shape shared by all GitHub endpoints.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// -- Client -------------------------------------------------------------------

/// Client for the GitHub contents API.
#[derive(Debug, Clone)]
pub struct ContentsClient {
    http: reqwest::Client,
    config: ContentApiConfig,
    read_retry: RetryPolicy,
}

impl ContentsClient {
    /// Create a new client from configuration.
    pub fn new(config: ContentApiConfig) -> Result<Self, ContentApiError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_token.as_str()))
            .map_err(|_| ConfigError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pahlawan-content-client/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| ContentApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            config,
            read_retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy used for reads.
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// `{api}/repos/{owner}/{repo}/contents/{path}`, each segment escaped.
    fn contents_url(&self, path: &str) -> Result<Url, ContentApiError> {
        let mut url = self.config.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConfigError::InvalidUrl(
                    "GITHUB_API_URL".into(),
                    "cannot be used as a base URL".into(),
                )
            })?
            .pop_if_empty()
            .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str(), "contents"])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Read a file and its blob SHA.
    ///
    /// Calls `GET {api}/repos/{owner}/{repo}/contents/{path}?ref={branch}`.
    pub async fn get(&self, path: &str) -> Result<RemoteFile, ContentApiError> {
        let endpoint = format!("GET contents/{path}");
        let url = self.contents_url(path)?;

        let resp = retry_send(self.read_retry, &endpoint, || {
            self.http
                .get(url.clone())
                .query(&[("ref", self.config.branch.as_str())])
                .send()
        })
        .await
        .map_err(|e| ContentApiError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ContentApiError::NotFound { path: path.to_string() });
        }
        if !status.is_success() {
            return Err(ContentApiError::Api {
                endpoint,
                status: status.as_u16(),
                message: upstream_message(resp).await,
            });
        }

        let file: ContentsFile = resp.json().await.map_err(|e| ContentApiError::Deserialization {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        let content = decode_file_content(path, &file)?;
        tracing::debug!(path, sha = %file.sha, bytes = content.len(), "read content file");
        Ok(RemoteFile {
            content,
            version: VersionToken::new(file.sha),
        })
    }

    /// Create or conditionally update a file.
    ///
    /// Calls `PUT {api}/repos/{owner}/{repo}/contents/{path}`. Sent once:
    /// writes are not retried.
    pub async fn put(&self, file: &PutFile) -> Result<PutOutcome, ContentApiError> {
        let endpoint = format!("PUT contents/{}", file.path);
        let url = self.contents_url(&file.path)?;

        let body = PutContentsRequest {
            message: &file.message,
            content: BASE64.encode(&file.content),
            branch: &self.config.branch,
            sha: file.version.as_ref().map(VersionToken::as_str),
        };

        let resp = self
            .http
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ContentApiError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = upstream_message(resp).await;
            if is_conflict(status, &message) {
                return Err(ContentApiError::VersionConflict {
                    path: file.path.clone(),
                    status: status.as_u16(),
                    message,
                });
            }
            return Err(ContentApiError::Api {
                endpoint,
                status: status.as_u16(),
                message,
            });
        }

        let written: PutContentsResponse =
            resp.json().await.map_err(|e| ContentApiError::Deserialization {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        tracing::info!(
            path = %file.path,
            sha = %written.content.sha,
            bytes = file.content.len(),
            "wrote content file"
        );
        Ok(PutOutcome {
            version: VersionToken::new(written.content.sha),
            commit_url: written.commit.and_then(|c| c.html_url),
        })
    }
}

#[async_trait]
impl ContentStore for ContentsClient {
    async fn get_file(&self, path: &str) -> Result<RemoteFile, ContentApiError> {
        self.get(path).await
    }

    async fn put_file(&self, file: &PutFile) -> Result<PutOutcome, ContentApiError> {
        self.put(file).await
    }

    fn public_url(&self, path: &str) -> String {
        self.config.raw_url(path)
    }
}

/// 409 is a stale `sha`; 422 naming `sha` is a missing one.
fn is_conflict(status: StatusCode, message: &str) -> bool {
    status == StatusCode::CONFLICT
        || (status == StatusCode::UNPROCESSABLE_ENTITY && message.contains("sha"))
}

fn decode_file_content(path: &str, file: &ContentsFile) -> Result<Vec<u8>, ContentApiError> {
    match file.encoding.as_deref() {
        Some("base64") | None => {
            // The API wraps base64 bodies at 60 columns.
            let compact: String = file.content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            BASE64.decode(compact).map_err(|e| ContentApiError::Decode {
                path: path.to_string(),
                reason: e.to_string(),
            })
        }
        Some(other) => Err(ContentApiError::Decode {
            path: path.to_string(),
            reason: format!("unsupported content encoding {other:?}"),
        }),
    }
}

/// Pull the upstream `message` out of an error response, falling back to
/// the raw body and then to the status reason.
async fn upstream_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&body) {
        return parsed.message;
    }
    if !body.trim().is_empty() {
        return body;
    }
    status.canonical_reason().unwrap_or("unknown error").to_string()
}
