//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge stores PRs and comments in memory, records every
//! operation for verification, and supports scripted failures via
//! [`FailOn`]. Test helpers can flip a PR to merged or closed to drive
//! the refresh engine.
//!
//! # Example
//!
//! ```
//! use cairn::forge::mock::MockForge;
//! use cairn::forge::{CreatePrRequest, Forge};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new();
//!
//! let pr = forge.create_pr(CreatePrRequest {
//!     head: "alice/stack-feat/1111111111111111".to_string(),
//!     base: "main".to_string(),
//!     title: "Add login".to_string(),
//!     body: None,
//!     draft: false,
//! }).await.unwrap();
//!
//! assert_eq!(pr.number, 101);
//! assert_eq!(pr.state, "open");
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use super::traits::{
    Comment, CreatePrRequest, Forge, ForgeError, PrStatus, PullRequest, RepoIdentity,
    UpdatePrRequest,
};

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `create_pr` with the given error.
    CreatePr(ForgeError),
    /// Fail `update_pr` with the given error.
    UpdatePr(ForgeError),
    /// Fail `batch_get_prs` with the given error.
    BatchGetPrs(ForgeError),
    /// Fail `mark_pr_draft` / `mark_pr_ready` with the given error.
    SetDraft(ForgeError),
    /// Fail `list_pr_comments` with the given error.
    ListComments(ForgeError),
    /// Fail `create_pr_comment` with the given error.
    CreateComment(ForgeError),
    /// Fail `update_pr_comment` with the given error.
    UpdateComment(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    CreatePr {
        head: String,
        base: String,
        title: String,
        draft: bool,
    },
    UpdatePr {
        number: u64,
        title: Option<String>,
        body: Option<String>,
        base: Option<String>,
    },
    BatchGetPrs {
        numbers: Vec<u64>,
    },
    MarkPrDraft {
        number: u64,
    },
    MarkPrReady {
        number: u64,
    },
    ListComments {
        number: u64,
    },
    CreateComment {
        number: u64,
        body: String,
    },
    UpdateComment {
        id: u64,
        body: String,
    },
    OpenPr {
        number: u64,
    },
}

/// A PR as the mock forge stores it.
#[derive(Debug, Clone)]
pub struct MockPr {
    pub number: u64,
    pub url: String,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: Option<String>,
    /// Lowercase state: `open`, `closed`, or `merged`
    pub state: String,
    pub is_draft: bool,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct MockForgeInner {
    prs: BTreeMap<u64, MockPr>,
    comments: BTreeMap<u64, Vec<Comment>>,
    next_pr_number: u64,
    next_comment_id: u64,
    username: String,
    identity: RepoIdentity,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockForge {
    /// Create a new empty mock forge for `acme/api`, authenticated as
    /// `alice`, numbering PRs from 101.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                prs: BTreeMap::new(),
                comments: BTreeMap::new(),
                next_pr_number: 101,
                next_comment_id: 9000,
                username: "alice".to_string(),
                identity: RepoIdentity {
                    owner: "acme".to_string(),
                    name: "api".to_string(),
                },
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    // =========================================================================
    // Test scripting
    // =========================================================================

    /// Override the authenticated username.
    pub fn set_username(&self, username: &str) {
        self.inner.lock().unwrap().username = username.to_string();
    }

    /// Script a failure.
    pub fn fail_on(&self, fail: FailOn) {
        self.inner.lock().unwrap().fail_on = Some(fail);
    }

    /// Clear any scripted failure.
    pub fn clear_fail(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Flip a PR to merged at the given instant.
    pub fn set_merged(&self, number: u64, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pr) = inner.prs.get_mut(&number) {
            pr.state = "merged".to_string();
            pr.is_draft = false;
            pr.merged_at = Some(at);
        }
    }

    /// Flip a PR to closed.
    pub fn set_closed(&self, number: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(pr) = inner.prs.get_mut(&number) {
            pr.state = "closed".to_string();
        }
    }

    // =========================================================================
    // Test inspection
    // =========================================================================

    /// All recorded operations, in order.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Look up a stored PR.
    pub fn pr(&self, number: u64) -> Option<MockPr> {
        self.inner.lock().unwrap().prs.get(&number).cloned()
    }

    /// Comments on a PR.
    pub fn comments(&self, number: u64) -> Vec<Comment> {
        self.inner
            .lock()
            .unwrap()
            .comments
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }

    fn check_fail(
        inner: &mut MockForgeInner,
        matcher: impl Fn(&FailOn) -> Option<&ForgeError>,
    ) -> Result<(), ForgeError> {
        if let Some(fail) = &inner.fail_on {
            if let Some(err) = matcher(fail) {
                return Err(err.clone());
            }
        }
        Ok(())
    }

    fn to_pull_request(pr: &MockPr) -> PullRequest {
        PullRequest {
            number: pr.number,
            url: pr.url.clone(),
            state: pr.state.clone(),
            is_draft: pr.is_draft,
            head: pr.head.clone(),
            base: pr.base.clone(),
            title: pr.title.clone(),
            body: pr.body.clone(),
        }
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn repo_info(&self) -> Result<RepoIdentity, ForgeError> {
        Ok(self.inner.lock().unwrap().identity.clone())
    }

    async fn username(&self) -> Result<String, ForgeError> {
        Ok(self.inner.lock().unwrap().username.clone())
    }

    async fn batch_get_prs(
        &self,
        numbers: &[u64],
    ) -> Result<HashMap<u64, PrStatus>, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::BatchGetPrs {
            numbers: numbers.to_vec(),
        });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::BatchGetPrs(e) => Some(e),
            _ => None,
        })?;

        let mut result = HashMap::new();
        for number in numbers {
            if let Some(pr) = inner.prs.get(number) {
                result.insert(
                    *number,
                    PrStatus {
                        state: pr.state.clone(),
                        is_merged: pr.state == "merged",
                        is_draft: pr.is_draft,
                        merged_at: pr.merged_at,
                    },
                );
            }
            // Unknown numbers are simply absent, as on the real forge.
        }
        Ok(result)
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreatePr {
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
            draft: request.draft,
        });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::CreatePr(e) => Some(e),
            _ => None,
        })?;

        let number = inner.next_pr_number;
        inner.next_pr_number += 1;
        let identity = inner.identity.clone();
        let pr = MockPr {
            number,
            url: format!(
                "https://github.com/{}/{}/pull/{number}",
                identity.owner, identity.name
            ),
            head: request.head,
            base: request.base,
            title: request.title,
            body: request.body,
            state: "open".to_string(),
            is_draft: request.draft,
            merged_at: None,
        };
        let result = Self::to_pull_request(&pr);
        inner.prs.insert(number, pr);
        Ok(result)
    }

    async fn update_pr(&self, request: UpdatePrRequest) -> Result<PullRequest, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::UpdatePr {
            number: request.number,
            title: request.title.clone(),
            body: request.body.clone(),
            base: request.base.clone(),
        });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::UpdatePr(e) => Some(e),
            _ => None,
        })?;

        let pr = inner
            .prs
            .get_mut(&request.number)
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{}", request.number)))?;
        if let Some(title) = request.title {
            pr.title = title;
        }
        if let Some(body) = request.body {
            pr.body = Some(body);
        }
        if let Some(base) = request.base {
            pr.base = base;
        }
        Ok(Self::to_pull_request(pr))
    }

    async fn mark_pr_draft(&self, number: u64) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::MarkPrDraft { number });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::SetDraft(e) => Some(e),
            _ => None,
        })?;

        let pr = inner
            .prs
            .get_mut(&number)
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{number}")))?;
        if pr.state != "open" {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("PR #{number} is {}", pr.state),
            });
        }
        pr.is_draft = true;
        Ok(())
    }

    async fn mark_pr_ready(&self, number: u64) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::MarkPrReady { number });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::SetDraft(e) => Some(e),
            _ => None,
        })?;

        let pr = inner
            .prs
            .get_mut(&number)
            .ok_or_else(|| ForgeError::NotFound(format!("PR #{number}")))?;
        if pr.state != "open" {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("PR #{number} is {}", pr.state),
            });
        }
        pr.is_draft = false;
        Ok(())
    }

    async fn list_pr_comments(&self, number: u64) -> Result<Vec<Comment>, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::ListComments { number });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::ListComments(e) => Some(e),
            _ => None,
        })?;

        Ok(inner.comments.get(&number).cloned().unwrap_or_default())
    }

    async fn create_pr_comment(&self, number: u64, body: &str) -> Result<u64, ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreateComment {
            number,
            body: body.to_string(),
        });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::CreateComment(e) => Some(e),
            _ => None,
        })?;

        if !inner.prs.contains_key(&number) {
            return Err(ForgeError::NotFound(format!("PR #{number}")));
        }
        let id = inner.next_comment_id;
        inner.next_comment_id += 1;
        inner.comments.entry(number).or_default().push(Comment {
            id,
            body: body.to_string(),
        });
        Ok(id)
    }

    async fn update_pr_comment(&self, comment_id: u64, body: &str) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::UpdateComment {
            id: comment_id,
            body: body.to_string(),
        });
        Self::check_fail(&mut inner, |f| match f {
            FailOn::UpdateComment(e) => Some(e),
            _ => None,
        })?;

        for comments in inner.comments.values_mut() {
            if let Some(comment) = comments.iter_mut().find(|c| c.id == comment_id) {
                comment.body = body.to_string();
                return Ok(());
            }
        }
        Err(ForgeError::NotFound(format!("comment {comment_id}")))
    }

    fn open_pr(&self, number: u64) -> Result<(), ForgeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::OpenPr { number });
        if inner.prs.contains_key(&number) {
            Ok(())
        } else {
            Err(ForgeError::NotFound(format!("PR #{number}")))
        }
    }
}
