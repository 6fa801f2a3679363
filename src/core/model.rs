//! core::model
//!
//! Value types and invariants for stacks, changes, and PR shadows.
//!
//! # Invariants
//!
//! - A change's `uuid` is its identity across amends; `commit_hash` is not.
//! - `merged_changes ++ active changes` is the full history; `position`
//!   is contiguous (1..=n) over that concatenation and `active_position`
//!   is contiguous over the unmerged subset (0 for merged changes).
//! - The first active change's desired base is the stack's base branch;
//!   every later active change's desired base is the previous active
//!   change's per-change branch.
//!
//! The pure helpers [`renumber`] and [`compute_desired_bases`] are the only
//! places these numbering rules are implemented; the context builder and
//! the property tests both go through them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::branch;
use crate::core::types::{ChangeId, Oid};

/// Current schema version of `prs.json`.
pub const PR_DATA_VERSION: u32 = 1;

/// Version of the commit-msg hook script installed by `cairn install`.
pub const HOOKS_VERSION: u32 = 1;

/// A stale sync is one older than this many seconds (5 minutes).
pub const STALE_SYNC_SECS: i64 = 300;

/// Forge-side state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    /// Open and ready for review
    Open,
    /// Open, marked as draft
    Draft,
    /// Closed without merging
    Closed,
    /// Merged into its base
    Merged,
}

impl PrState {
    /// Whether the forge will still accept title/body/draft mutations.
    pub fn is_mutable(self) -> bool {
        matches!(self, PrState::Open | PrState::Draft)
    }

    /// Normalize a forge-reported state triple into the engine's state.
    ///
    /// The merged flag wins over the raw state string; a draft is only a
    /// draft while it is still open.
    pub fn from_forge(state: &str, is_draft: bool, is_merged: bool) -> Self {
        if is_merged || state.eq_ignore_ascii_case("merged") {
            PrState::Merged
        } else if state.eq_ignore_ascii_case("closed") {
            PrState::Closed
        } else if is_draft {
            PrState::Draft
        } else {
            PrState::Open
        }
    }
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Draft => write!(f, "draft"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// Local shadow of a forge pull request, keyed by change id in `prs.json`.
///
/// A record with `pr_number == 0` is a stub holding local intent (draft
/// preference) for a change that has not been pushed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrRecord {
    /// Forge PR number (0 = not yet created on the forge)
    pub pr_number: u64,
    /// Web URL of the PR
    #[serde(default)]
    pub url: String,
    /// Source branch of the PR (a per-change branch, or the TOP branch)
    pub branch: String,
    /// Commit last pushed to the PR branch
    pub commit_hash: Oid,
    /// When the PR record was created
    pub created_at: DateTime<Utc>,
    /// When the PR branch was last pushed
    #[serde(default)]
    pub last_pushed: Option<DateTime<Utc>>,
    /// Last observed forge state
    pub state: PrState,
    /// Cached PR title (as last pushed)
    #[serde(default)]
    pub title: String,
    /// Cached PR body (as last pushed)
    #[serde(default)]
    pub body: String,
    /// Cached PR base branch (as last pushed)
    #[serde(default)]
    pub base: String,
    /// Forge comment id of the stack-visualization comment
    #[serde(default)]
    pub viz_comment_id: Option<u64>,
    /// Draft status the user wants
    #[serde(default)]
    pub local_draft_status: bool,
    /// Draft status last observed on the forge
    #[serde(default)]
    pub remote_draft_status: bool,
}

impl PrRecord {
    /// Whether this record exists on the forge.
    pub fn on_forge(&self) -> bool {
        self.pr_number != 0
    }
}

/// On-disk shape of `prs.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrData {
    /// Schema version (always 1)
    pub version: u32,
    /// PR records keyed by change id
    #[serde(default)]
    pub prs: std::collections::BTreeMap<ChangeId, PrRecord>,
}

impl Default for PrData {
    fn default() -> Self {
        Self {
            version: PR_DATA_VERSION,
            prs: std::collections::BTreeMap::new(),
        }
    }
}

/// A single unit of a stack: one commit, optionally backed by a PR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// 1-indexed position within the full history, merged changes included
    pub position: u32,
    /// 1-indexed position within unmerged changes; 0 once merged
    #[serde(default)]
    pub active_position: u32,
    /// Commit title (first line of the message)
    pub title: String,
    /// Commit body without the trailer block
    #[serde(default)]
    pub description: String,
    /// Current commit hash (changes on amend)
    pub commit_hash: Oid,
    /// Stable identity from the `PR-UUID` trailer; `None` for commits
    /// without trailers, which are visible but not editable by id
    #[serde(default)]
    pub uuid: Option<ChangeId>,
    /// Base branch this change's PR ought to target (computed, not stored)
    #[serde(skip)]
    pub desired_base: String,
    /// Attached PR shadow (resolved from `prs.json`, not stored here)
    #[serde(skip)]
    pub pr: Option<PrRecord>,
    /// Whether the change has been merged on the forge
    #[serde(default)]
    pub is_merged: bool,
    /// When the change's PR merged
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Set when the commit's `PR-Stack` trailer names a different stack;
    /// such changes are listed but not editable here
    #[serde(skip)]
    pub foreign_stack: Option<String>,
}

impl Change {
    /// The forge PR number attached to this change, if any.
    pub fn pr_number(&self) -> Option<u64> {
        self.pr.as_ref().filter(|p| p.on_forge()).map(|p| p.pr_number)
    }

    /// Whether this change has no PR on the forge yet.
    pub fn is_local(&self) -> bool {
        self.pr_number().is_none()
    }

    /// Whether this change belongs to a different stack.
    pub fn is_foreign(&self) -> bool {
        self.foreign_stack.is_some()
    }

    /// Whether the attached PR is known merged.
    pub fn pr_merged(&self) -> bool {
        self.pr
            .as_ref()
            .is_some_and(|p| p.on_forge() && p.state == PrState::Merged)
    }
}

/// A named stack: persisted metadata for one ordered sequence of changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    /// Stack name
    pub name: String,
    /// TOP branch name holding the full linear history
    pub branch: String,
    /// Target branch on the forge (e.g. `main`)
    pub base: String,
    /// Forge repository owner, cached at creation
    #[serde(default)]
    pub owner: String,
    /// Forge repository name, cached at creation
    #[serde(default)]
    pub repo_name: String,
    /// When the stack was created
    pub created: DateTime<Utc>,
    /// Wall clock of the most recent forge reconciliation
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
    /// TOP commit at `last_synced`
    #[serde(default)]
    pub sync_hash: Option<Oid>,
    /// Commit of `base` at the last restack
    pub base_ref: Oid,
    /// Previously-active changes known to be merged, in merge order
    #[serde(default)]
    pub merged_changes: Vec<Change>,
}

impl Stack {
    /// The username segment of the TOP branch.
    ///
    /// Branch names are the identity of record; the username is derived
    /// from them rather than cached separately.
    pub fn user(&self) -> Option<&str> {
        branch::extract_user(&self.branch)
    }

    /// Change ids already recorded as merged.
    pub fn merged_uuids(&self) -> std::collections::BTreeSet<ChangeId> {
        self.merged_changes
            .iter()
            .filter_map(|c| c.uuid.clone())
            .collect()
    }
}

/// Result of the sync-status predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The stack has never been reconciled with the forge
    NeverSynced,
    /// The TOP branch moved since the last reconciliation
    CommitsChanged,
    /// The last reconciliation is older than the staleness threshold
    Stale,
    /// The TOP branch could not be resolved
    HashCheckFailed,
    /// No reconciliation needed
    Fresh,
}

impl SyncStatus {
    /// Whether a refresh should run.
    pub fn needs_sync(self) -> bool {
        !matches!(self, SyncStatus::Fresh)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::NeverSynced => write!(f, "never synced"),
            SyncStatus::CommitsChanged => write!(f, "commits changed"),
            SyncStatus::Stale => write!(f, "stale"),
            SyncStatus::HashCheckFailed => write!(f, "hash check failed"),
            SyncStatus::Fresh => write!(f, "fresh"),
        }
    }
}

/// Process-wide install record (`<store>/config.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RepositoryConfig {
    /// Whether the commit-msg hook has been installed
    #[serde(default)]
    pub hooks_installed: bool,
    /// Version of the installed hook script
    #[serde(default)]
    pub hooks_version: u32,
    /// Whether repository git configuration has been applied
    #[serde(default)]
    pub git_configured: bool,
    /// When the repository was first installed
    #[serde(default)]
    pub installed_at: Option<DateTime<Utc>>,
    /// When the install record was last touched
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl RepositoryConfig {
    /// Whether this repository has been set up for stack use.
    pub fn is_installed(&self) -> bool {
        self.hooks_installed
    }
}

/// Recovery record persisted before multi-step VCS mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebaseState {
    /// TOP commit before the operation began
    pub original_stack_head: Oid,
    /// Rewritten commit the operation was propagating, if any
    #[serde(default)]
    pub new_commit_hash: Option<Oid>,
    /// Commit being replaced, if any
    #[serde(default)]
    pub old_commit_hash: Option<Oid>,
    /// TOP branch the operation was mutating
    pub stack_branch: String,
    /// When the operation began
    pub timestamp: DateTime<Utc>,
}

/// Recompute contiguous positions over the full ordered history.
///
/// `position` runs 1..=n across the whole list; `active_position` runs
/// 1..=m across unmerged changes and is 0 for merged ones.
pub fn renumber(changes: &mut [Change]) {
    let mut active = 0u32;
    for (i, change) in changes.iter_mut().enumerate() {
        change.position = i as u32 + 1;
        if change.is_merged {
            change.active_position = 0;
        } else {
            active += 1;
            change.active_position = active;
        }
    }
}

/// Compute the desired base chain over the active changes.
///
/// The first active change targets `base`; each subsequent change targets
/// the per-change branch of the nearest previous change that has an id.
/// Changes without trailers cannot anchor a branch, so the chain skips
/// them.
pub fn compute_desired_bases(changes: &mut [Change], user: &str, stack_name: &str, base: &str) {
    let mut prev = base.to_string();
    for change in changes.iter_mut() {
        change.desired_base = prev.clone();
        if let Some(uuid) = &change.uuid {
            prev = branch::uuid_branch(user, stack_name, uuid);
        }
    }
}
