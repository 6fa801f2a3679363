//! forge::github
//!
//! GitHub forge implementation using REST and GraphQL APIs.
//!
//! # Design
//!
//! - REST for PR create/update, comments, and user identity
//! - One aliased GraphQL query for the batched PR-state lookup, so a
//!   refresh costs a single round-trip regardless of stack depth
//! - GraphQL mutations for draft toggling (GitHub requires GraphQL there)
//!
//! # Authentication
//!
//! All calls carry a bearer token. The engine never resolves tokens; the
//! CLI layer reads `GITHUB_TOKEN` / `GH_TOKEN` and hands the value in.
//!
//! # Rate Limiting
//!
//! GitHub rate limits surface as `ForgeError::RateLimited`. No automatic
//! retry is attempted.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use super::traits::{
    Comment, CreatePrRequest, Forge, ForgeError, PrStatus, PullRequest, RepoIdentity,
    UpdatePrRequest,
};

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default GitHub web URL.
const DEFAULT_WEB_BASE: &str = "https://github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "cairn-cli";

/// GitHub forge implementation.
#[derive(Debug, Clone)]
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token for authentication
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
}

impl GitHubForge {
    /// Create a new GitHub forge bound to a repository.
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a GitHub forge with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise installations and for tests that
    /// point the adapter at a local mock server.
    pub fn with_api_base(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into(),
        }
    }

    /// Create a GitHub forge from a remote URL.
    ///
    /// # Example
    ///
    /// ```
    /// use cairn::forge::github::GitHubForge;
    ///
    /// assert!(GitHubForge::from_remote_url("git@github.com:owner/repo.git", "t").is_some());
    /// assert!(GitHubForge::from_remote_url("https://github.com/owner/repo.git", "t").is_some());
    /// assert!(GitHubForge::from_remote_url("https://gitlab.com/owner/repo", "t").is_none());
    /// ```
    pub fn from_remote_url(url: &str, token: impl Into<String>) -> Option<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Some(Self::new(token, owner, repo))
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// GraphQL endpoint derived from the API base.
    fn graphql_url(&self) -> String {
        if self.api_base == DEFAULT_API_BASE {
            format!("{DEFAULT_API_BASE}/graphql")
        } else {
            format!("{}/graphql", self.api_base)
        }
    }

    /// Web URL for a PR.
    fn pr_web_url(&self, number: u64) -> String {
        format!("{DEFAULT_WEB_BASE}/{}/{}/pull/{number}", self.owner, self.repo)
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {e}"),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("permission denied: {message}")),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Execute a GraphQL request and surface GraphQL-level errors.
    async fn graphql(&self, body: serde_json::Value) -> Result<serde_json::Value, ForgeError> {
        let response = self
            .client
            .post(self.graphql_url())
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(response, status).await;
        }

        let result: serde_json::Value =
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse GraphQL response: {e}"),
            })?;

        if let Some(errors) = result.get("errors").and_then(|e| e.as_array()) {
            if let Some(first) = errors.first() {
                let message = first
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("GraphQL error")
                    .to_string();
                return Err(ForgeError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }
        }

        Ok(result)
    }

    /// Resolve a PR's GraphQL node id (needed for draft mutations).
    async fn pr_node_id(&self, number: u64) -> Result<String, ForgeError> {
        let response = self
            .client
            .get(self.repo_url(&format!("pulls/{number}")))
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        let pr: GitHubPr = self.handle_response(response).await?;
        pr.node_id
            .ok_or_else(|| ForgeError::NotFound(format!("node id for PR #{number}")))
    }

    /// Toggle draft status via GraphQL.
    async fn set_draft(&self, number: u64, draft: bool) -> Result<(), ForgeError> {
        let node_id = self.pr_node_id(number).await?;
        let mutation = if draft {
            r#"mutation($id: ID!) {
                convertPullRequestToDraft(input: {pullRequestId: $id}) {
                    pullRequest { id }
                }
            }"#
        } else {
            r#"mutation($id: ID!) {
                markPullRequestReadyForReview(input: {pullRequestId: $id}) {
                    pullRequest { id }
                }
            }"#
        };

        self.graphql(serde_json::json!({
            "query": mutation,
            "variables": { "id": node_id }
        }))
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn repo_info(&self) -> Result<RepoIdentity, ForgeError> {
        Ok(RepoIdentity {
            owner: self.owner.clone(),
            name: self.repo.clone(),
        })
    }

    async fn username(&self) -> Result<String, ForgeError> {
        let response = self
            .client
            .get(format!("{}/user", self.api_base))
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;
        let user: GitHubUser = self.handle_response(response).await?;
        Ok(user.login)
    }

    async fn batch_get_prs(
        &self,
        numbers: &[u64],
    ) -> Result<HashMap<u64, PrStatus>, ForgeError> {
        if numbers.is_empty() {
            return Ok(HashMap::new());
        }

        // One aliased query: pr0, pr1, ... map back to `numbers` by index.
        let mut fields = String::new();
        for (i, number) in numbers.iter().enumerate() {
            fields.push_str(&format!(
                "pr{i}: pullRequest(number: {number}) {{ state isDraft merged mergedAt }}\n"
            ));
        }
        let query = format!(
            "query($owner: String!, $name: String!) {{ repository(owner: $owner, name: $name) {{ {fields} }} }}"
        );

        let result = self
            .graphql(serde_json::json!({
                "query": query,
                "variables": { "owner": self.owner, "name": self.repo }
            }))
            .await?;

        let repository = result
            .get("data")
            .and_then(|d| d.get("repository"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let mut statuses = HashMap::new();
        for (i, number) in numbers.iter().enumerate() {
            let Some(node) = repository.get(format!("pr{i}")) else {
                continue;
            };
            if node.is_null() {
                continue;
            }
            let state = node
                .get("state")
                .and_then(|s| s.as_str())
                .unwrap_or("open")
                .to_ascii_lowercase();
            let is_draft = node
                .get("isDraft")
                .and_then(|d| d.as_bool())
                .unwrap_or(false);
            let is_merged = node
                .get("merged")
                .and_then(|m| m.as_bool())
                .unwrap_or(false);
            let merged_at = node
                .get("mergedAt")
                .and_then(|m| m.as_str())
                .and_then(|s| s.parse::<DateTime<Utc>>().ok());
            statuses.insert(
                *number,
                PrStatus {
                    state,
                    is_merged,
                    is_draft,
                    merged_at,
                },
            );
        }
        Ok(statuses)
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let body = serde_json::json!({
            "head": request.head,
            "base": request.base,
            "title": request.title,
            "body": request.body,
            "draft": request.draft,
        });

        let response = self
            .client
            .post(self.repo_url("pulls"))
            .headers(self.headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let pr: GitHubPr = self.handle_response(response).await?;
        Ok(pr.into_pull_request(self))
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError> {
        let mut body = serde_json::Map::new();
        if let Some(title) = request.title {
            body.insert("title".into(), serde_json::Value::String(title));
        }
        if let Some(text) = request.body {
            body.insert("body".into(), serde_json::Value::String(text));
        }
        if let Some(base) = request.base {
            body.insert("base".into(), serde_json::Value::String(base));
        }

        let response = self
            .client
            .patch(self.repo_url(&format!("pulls/{}", request.number)))
            .headers(self.headers())
            .json(&serde_json::Value::Object(body))
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let pr: GitHubPr = self.handle_response(response).await?;
        Ok(pr.into_pull_request(self))
    }

    async fn mark_pr_draft(&self, number: u64) -> Result<(), ForgeError> {
        self.set_draft(number, true).await
    }

    async fn mark_pr_ready(&self, number: u64) -> Result<(), ForgeError> {
        self.set_draft(number, false).await
    }

    async fn list_pr_comments(&self, number: u64) -> Result<Vec<Comment>, ForgeError> {
        let response = self
            .client
            .get(self.repo_url(&format!("issues/{number}/comments")))
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let comments: Vec<GitHubComment> = self.handle_response(response).await?;
        Ok(comments
            .into_iter()
            .map(|c| Comment {
                id: c.id,
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_pr_comment(&self, number: u64, body: &str) -> Result<u64, ForgeError> {
        let response = self
            .client
            .post(self.repo_url(&format!("issues/{number}/comments")))
            .headers(self.headers())
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let comment: GitHubComment = self.handle_response(response).await?;
        Ok(comment.id)
    }

    async fn update_pr_comment(&self, comment_id: u64, body: &str) -> Result<(), ForgeError> {
        let response = self
            .client
            .patch(self.repo_url(&format!("issues/comments/{comment_id}")))
            .headers(self.headers())
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let _: GitHubComment = self.handle_response(response).await?;
        Ok(())
    }

    fn open_pr(&self, number: u64) -> Result<(), ForgeError> {
        open::that(self.pr_web_url(number))
            .map_err(|e| ForgeError::NetworkError(format!("failed to open browser: {e}")))
    }
}

/// Parse a GitHub remote URL into (owner, repo).
///
/// Accepts SSH (`git@github.com:owner/repo.git`) and HTTPS
/// (`https://github.com/owner/repo[.git]`) forms.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else if let Some(rest) = url.strip_prefix("https://github.com/") {
        rest
    } else if let Some(rest) = url.strip_prefix("ssh://git@github.com/") {
        rest
    } else {
        return None;
    };

    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let rest = rest.trim_end_matches('/');
    let mut parts = rest.split('/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if owner.is_empty() || repo.is_empty() || parts.next().is_some() {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPr {
    number: u64,
    #[serde(default)]
    html_url: Option<String>,
    state: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    merged: bool,
    head: GitHubRef,
    base: GitHubRef,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    node_id: Option<String>,
}

impl GitHubPr {
    fn into_pull_request(self, forge: &GitHubForge) -> PullRequest {
        let state = if self.merged {
            "merged".to_string()
        } else {
            self.state.to_ascii_lowercase()
        };
        PullRequest {
            url: self
                .html_url
                .unwrap_or_else(|| forge.pr_web_url(self.number)),
            number: self.number,
            state,
            is_draft: self.draft,
            head: self.head.name,
            base: self.base.name,
            title: self.title,
            body: self.body,
        }
    }
}
