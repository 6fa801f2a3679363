//! forge::traits
//!
//! Forge trait definition for interacting with remote hosting services.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network
//! I/O. All methods return `Result` to handle API errors gracefully.
//! States cross this boundary as lowercase strings exactly as the forge
//! reports them; normalization into the engine's
//! [`PrState`](crate::core::model::PrState) happens on the engine side.
//!
//! # Example
//!
//! ```ignore
//! use cairn::forge::{Forge, CreatePrRequest};
//!
//! async fn submit(forge: &dyn Forge) -> Result<(), ForgeError> {
//!     let pr = forge
//!         .create_pr(CreatePrRequest {
//!             head: "alice/stack-feat/1111111111111111".to_string(),
//!             base: "main".to_string(),
//!             title: "Add login".to_string(),
//!             body: None,
//!             draft: false,
//!         })
//!         .await?;
//!     println!("Created PR #{}: {}", pr.number, pr.url);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from forge operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required (set GITHUB_TOKEN)")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Repository identity on the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    /// Owner (user or organization)
    pub owner: String,
    /// Repository name
    pub name: String,
}

/// One entry of a batched PR-state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrStatus {
    /// Forge state, lowercase: `open`, `closed`, or `merged`
    pub state: String,
    /// Whether the PR has been merged
    pub is_merged: bool,
    /// Whether the PR is a draft
    pub is_draft: bool,
    /// When the PR merged, if it has
    pub merged_at: Option<DateTime<Utc>>,
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
    /// Create as draft
    pub draft: bool,
}

/// Request to update a pull request.
#[derive(Debug, Clone, Default)]
pub struct UpdatePrRequest {
    /// PR number
    pub number: u64,
    /// New title (if changing)
    pub title: Option<String>,
    /// New body (if changing)
    pub body: Option<String>,
    /// New base branch (if changing)
    pub base: Option<String>,
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR URL (web URL for viewing)
    pub url: String,
    /// Forge state, lowercase: `open`, `closed`, or `merged`
    pub state: String,
    /// Whether the PR is a draft
    pub is_draft: bool,
    /// Head branch name
    pub head: String,
    /// Base branch name
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body
    pub body: Option<String>,
}

/// A PR comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Forge comment id
    pub id: u64,
    /// Comment body (Markdown)
    pub body: String,
}

/// The Forge trait for interacting with remote hosting services.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so visualization-comment upserts
/// can fan out across tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed`: point the user at token setup
/// - `NotFound`: resource doesn't exist
/// - `RateLimited`: back off and retry
/// - `ApiError` / `NetworkError`: display and stop
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Identity of the repository this adapter is bound to.
    async fn repo_info(&self) -> Result<RepoIdentity, ForgeError>;

    /// The authenticated user's login.
    ///
    /// Used only for branch naming, and resolved at most once per
    /// invocation (stack creation); navigation derives the user segment
    /// from persisted branch names instead.
    async fn username(&self) -> Result<String, ForgeError>;

    /// Fetch the state of many PRs in one query.
    ///
    /// The result maps PR number to status. Numbers the forge does not
    /// know are absent from the map; callers treat absence as a transient
    /// condition and keep their cached state.
    async fn batch_get_prs(
        &self,
        numbers: &[u64],
    ) -> Result<HashMap<u64, PrStatus>, ForgeError>;

    /// Create a new pull request.
    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Update an existing pull request.
    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError>;

    /// Convert a PR to draft.
    async fn mark_pr_draft(&self, number: u64) -> Result<(), ForgeError>;

    /// Mark a PR ready for review.
    async fn mark_pr_ready(&self, number: u64) -> Result<(), ForgeError>;

    /// List comments on a PR.
    async fn list_pr_comments(&self, number: u64) -> Result<Vec<Comment>, ForgeError>;

    /// Create a comment on a PR; returns the new comment id.
    async fn create_pr_comment(&self, number: u64, body: &str) -> Result<u64, ForgeError>;

    /// Update an existing PR comment.
    async fn update_pr_comment(&self, comment_id: u64, body: &str) -> Result<(), ForgeError>;

    /// Open a PR in the user's browser.
    fn open_pr(&self, number: u64) -> Result<(), ForgeError>;
}
