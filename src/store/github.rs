//! store::github
//!
//! GitHub object store implementation using the git data REST API.
//!
//! # Design
//!
//! Every trait operation maps to one REST call under
//! `/repos/{owner}/{repo}/git/`:
//!
//! | Operation | Request |
//! |---|---|
//! | `get_ref` | `GET ref/heads/{branch}` |
//! | `get_commit` | `GET commits/{sha}` |
//! | `get_tree` | `GET trees/{sha}?recursive=1` |
//! | `get_blob` | `GET blobs/{sha}` |
//! | `create_blob` | `POST blobs` |
//! | `create_tree` | `POST trees` |
//! | `create_commit` | `POST commits` |
//! | `update_ref` | `PATCH refs/heads/{branch}` with `force: false` |
//! | `create_ref` | `POST refs` |
//!
//! GitHub has no compare-and-set on refs. `force: false` makes the update a
//! fast-forward check instead: if another writer moved the branch, our new
//! commit is no longer a descendant of the tip and the update is rejected.
//!
//! # Status mapping
//!
//! - 401 / 403 => `AuthFailed` (403 with an exhausted rate limit => `RateLimited`)
//! - 404 => `NotFound`
//! - 409 on `get_ref` (empty repository) => no ref
//! - 422 "not a fast forward" => `Conflict`
//! - 422 "already exists" => `AlreadyExists`
//! - 429 => `RateLimited`
//! - 5xx => `ApiError` (transient)
//!
//! # Example
//!
//! ```ignore
//! use stagepush::store::github::GitHubStore;
//! use std::time::Duration;
//!
//! let store = GitHubStore::new(Some(token), "octocat", "site", Duration::from_secs(30))?;
//! let head = store.get_ref(&branch).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{
    decode_blob, BlobContent, CommitInfo, CreateCommitRequest, CreateTreeRequest, FileMode,
    ObjectKind, ObjectStore, StoreError, TreeEntry, UpdateRefRequest,
};
use crate::core::types::{BranchName, Oid};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "stagepush";

/// GitHub object store.
pub struct GitHubStore {
    /// HTTP client carrying the per-request timeout
    client: Client,
    /// Access token
    token: Option<String>,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubStore")
            .field("has_token", &self.token.is_some())
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubStore {
    /// Create a store for `owner/repo` on github.com.
    ///
    /// `timeout` bounds every single HTTP request.
    pub fn new(
        token: Option<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        Self::with_api_base(token, owner, repo, DEFAULT_API_BASE, timeout)
    }

    /// Create a store with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise installations, or to point at a test server.
    pub fn with_api_base(
        token: Option<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::NetworkError(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token,
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, StoreError> {
        let token = self.token.as_deref().ok_or(StoreError::AuthRequired)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                StoreError::AuthFailed("token contains invalid characters".into())
            })?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a git data endpoint.
    fn git_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    async fn get(&self, path: &str) -> Result<Response, StoreError> {
        debug!(method = "GET", path, "github request");
        self.client
            .get(self.git_url(path))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(network_error)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<Response, StoreError> {
        debug!(method = %method, path, "github request");
        self.client
            .request(method, self.git_url(path))
            .headers(self.headers()?)
            .json(body)
            .send()
            .await
            .map_err(network_error)
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, StoreError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| StoreError::InvalidResponse(format!("failed to parse response: {}", e)))
        } else {
            Err(self.error_from_response(response, status).await)
        }
    }

    /// Map an error response to a `StoreError`.
    async fn error_from_response(&self, response: Response, status: StatusCode) -> StoreError {
        let rate_limit_exhausted = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "0")
            .unwrap_or(false);

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => StoreError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if rate_limit_exhausted => StoreError::RateLimited,
            StatusCode::FORBIDDEN => StoreError::AuthFailed(format!("Permission denied: {}", message)),
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => StoreError::RateLimited,
            _ if status.is_server_error() => StoreError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => StoreError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

fn network_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::NetworkError(format!("request timed out: {}", e))
    } else {
        StoreError::NetworkError(e.to_string())
    }
}

fn parse_oid(sha: String) -> Result<Oid, StoreError> {
    Oid::new(sha).map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

fn is_unprocessable(err: &StoreError) -> Option<&str> {
    match err {
        StoreError::ApiError {
            status: 422,
            message,
        } => Some(message.as_str()),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for GitHubStore {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_ref(&self, branch: &BranchName) -> Result<Option<Oid>, StoreError> {
        let response = self.get(&format!("ref/heads/{}", branch)).await?;
        let status = response.status();

        // 409 is GitHub's answer for a repository without any commits.
        if status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
            debug!(branch = %branch, status = status.as_u16(), "ref not found");
            return Ok(None);
        }

        let reference: GitHubRef = self.handle_response(response).await?;
        parse_oid(reference.object.sha).map(Some)
    }

    async fn get_commit(&self, oid: &Oid) -> Result<CommitInfo, StoreError> {
        let response = self.get(&format!("commits/{}", oid)).await?;
        let commit: GitHubCommit = self.handle_response(response).await?;

        Ok(CommitInfo {
            tree: parse_oid(commit.tree.sha)?,
            parents: commit
                .parents
                .into_iter()
                .map(|p| parse_oid(p.sha))
                .collect::<Result<_, _>>()?,
            message: commit.message,
        })
    }

    async fn get_tree(&self, oid: &Oid) -> Result<Vec<TreeEntry>, StoreError> {
        let response = self.get(&format!("trees/{}?recursive=1", oid)).await?;
        let tree: GitHubTree = self.handle_response(response).await?;

        if tree.truncated {
            return Err(StoreError::InvalidResponse(format!(
                "tree {} is too large to list recursively",
                oid
            )));
        }

        tree.tree
            .into_iter()
            .map(|item| {
                let mode = FileMode::parse(&item.mode).ok_or_else(|| {
                    StoreError::InvalidResponse(format!("unknown file mode '{}'", item.mode))
                })?;
                let kind = ObjectKind::parse(&item.kind).ok_or_else(|| {
                    StoreError::InvalidResponse(format!("unknown object type '{}'", item.kind))
                })?;
                Ok(TreeEntry {
                    path: item.path,
                    mode,
                    kind,
                    oid: parse_oid(item.sha)?,
                })
            })
            .collect()
    }

    async fn get_blob(&self, oid: &Oid) -> Result<Vec<u8>, StoreError> {
        let response = self.get(&format!("blobs/{}", oid)).await?;
        let blob: GitHubBlob = self.handle_response(response).await?;
        decode_blob(&blob.content, &blob.encoding)
    }

    async fn create_blob(&self, content: BlobContent) -> Result<Oid, StoreError> {
        let (payload, encoding) = content.encode();
        let body = CreateBlobBody {
            content: &payload,
            encoding: encoding.as_str(),
        };

        let response = self
            .send_json(reqwest::Method::POST, "blobs", &body)
            .await?;
        let created: GitHubSha = self.handle_response(response).await?;
        parse_oid(created.sha)
    }

    async fn create_tree(&self, request: CreateTreeRequest) -> Result<Oid, StoreError> {
        let entries: Vec<TreeItemBody<'_>> = request
            .entries
            .iter()
            .map(|e| TreeItemBody {
                path: &e.path,
                mode: e.mode.as_str(),
                kind: e.kind.as_str(),
                sha: e.oid.as_str(),
            })
            .collect();
        let body = CreateTreeBody {
            base_tree: request.base_tree.as_ref().map(Oid::as_str),
            tree: entries,
        };

        let response = self
            .send_json(reqwest::Method::POST, "trees", &body)
            .await?;
        let created: GitHubSha = self.handle_response(response).await?;
        parse_oid(created.sha)
    }

    async fn create_commit(&self, request: CreateCommitRequest) -> Result<Oid, StoreError> {
        let parents: Vec<&str> = request.parents.iter().map(Oid::as_str).collect();
        let body = CreateCommitBody {
            message: &request.message,
            tree: request.tree.as_str(),
            parents,
            author: request.author.as_ref().map(|a| AuthorBody {
                name: &a.name,
                email: &a.email,
            }),
        };

        let response = self
            .send_json(reqwest::Method::POST, "commits", &body)
            .await?;
        let created: GitHubSha = self.handle_response(response).await?;
        parse_oid(created.sha)
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        request: UpdateRefRequest,
    ) -> Result<(), StoreError> {
        let body = UpdateRefBody {
            sha: request.new.as_str(),
            force: false,
        };

        let response = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("refs/heads/{}", branch),
                &body,
            )
            .await?;

        match self.handle_response::<GitHubRef>(response).await {
            Ok(_) => Ok(()),
            Err(err) => match is_unprocessable(&err) {
                Some(message) if message.to_lowercase().contains("does not exist") => {
                    Err(StoreError::NotFound(message.to_string()))
                }
                Some(message) => Err(StoreError::Conflict(format!(
                    "{} moved away from {}: {}",
                    branch,
                    request.expected.short(7),
                    message
                ))),
                None => Err(err),
            },
        }
    }

    async fn create_ref(&self, branch: &BranchName, oid: &Oid) -> Result<(), StoreError> {
        let full_ref = branch.full_ref();
        let body = CreateRefBody {
            reference: &full_ref,
            sha: oid.as_str(),
        };

        let response = self
            .send_json(reqwest::Method::POST, "refs", &body)
            .await?;

        match self.handle_response::<GitHubRef>(response).await {
            Ok(_) => Ok(()),
            Err(err) => match is_unprocessable(&err) {
                Some(message) if message.to_lowercase().contains("already exists") => {
                    Err(StoreError::AlreadyExists(message.to_string()))
                }
                _ => Err(err),
            },
        }
    }
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Serialize)]
struct CreateBlobBody<'a> {
    content: &'a str,
    encoding: &'a str,
}

#[derive(Serialize)]
struct TreeItemBody<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CreateTreeBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<&'a str>,
    tree: Vec<TreeItemBody<'a>>,
}

#[derive(Serialize)]
struct AuthorBody<'a> {
    name: &'a str,
    email: &'a str,
}

#[derive(Serialize)]
struct CreateCommitBody<'a> {
    message: &'a str,
    tree: &'a str,
    parents: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<AuthorBody<'a>>,
}

#[derive(Serialize)]
struct UpdateRefBody<'a> {
    sha: &'a str,
    force: bool,
}

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    reference: &'a str,
    sha: &'a str,
}

#[derive(Deserialize)]
struct GitHubSha {
    sha: String,
}

#[derive(Deserialize)]
struct GitHubRef {
    object: GitHubSha,
}

#[derive(Deserialize)]
struct GitHubCommit {
    tree: GitHubSha,
    #[serde(default)]
    parents: Vec<GitHubSha>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct GitHubTreeItem {
    path: String,
    mode: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
}

#[derive(Deserialize)]
struct GitHubTree {
    tree: Vec<GitHubTreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct GitHubBlob {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

// =============================================================================
// Repository parsing
// =============================================================================

/// Parse a GitHub remote URL into (owner, repo).
///
/// # Example
///
/// ```
/// use stagepush::store::github::parse_github_url;
///
/// assert_eq!(
///     parse_github_url("git@github.com:octocat/site.git"),
///     Some(("octocat".to_string(), "site".to_string()))
/// );
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    // SSH format: git@github.com:owner/repo.git
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        return split_owner_repo(rest.strip_suffix(".git").unwrap_or(rest));
    }

    // HTTPS format: https://github.com/owner/repo.git
    if let Some(rest) = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
    {
        return split_owner_repo(rest.strip_suffix(".git").unwrap_or(rest));
    }

    None
}

/// Parse either an `owner/repo` slug or a GitHub remote URL.
pub fn parse_repo_spec(spec: &str) -> Option<(String, String)> {
    parse_github_url(spec).or_else(|| {
        if spec.contains(':') {
            return None;
        }
        split_owner_repo(spec)
    })
}

fn split_owner_repo(rest: &str) -> Option<(String, String)> {
    let (owner, repo) = rest.split_once('/')?;
    let valid = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };
    if valid(owner) && valid(repo) {
        Some((owner.to_string(), repo.to_string()))
    } else {
        None
    }
}
