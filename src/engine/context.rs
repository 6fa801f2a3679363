//! engine::context
//!
//! Derives a [`StackContext`] from the current branch, persisted state,
//! and the working commits.
//!
//! # Algorithm
//!
//! 1. Parse the current branch; anything that is not a TOP or per-change
//!    branch yields no context.
//! 2. Load the stack's metadata and PR records.
//! 3. Enumerate commits on the TOP branch between `base` and `branch`
//!    (oldest first) and turn each into a [`Change`] via its trailers,
//!    attaching the PR record by change id.
//! 4. Prepend the recorded merged changes and renumber positions
//!    contiguously.
//! 5. Compute the desired-base chain over the active changes.
//! 6. Partition out "stale merged" changes: still on the TOP branch but
//!    already merged on the forge. They are shown, but the engine treats
//!    them as merged.
//! 7. Resolve the current change id from the branch name.
//!
//! All downstream operations consume the context rather than re-reading
//! disk.

use std::collections::BTreeSet;

use crate::core::branch;
use crate::core::model::{compute_desired_bases, renumber, Change, Stack};
use crate::core::trailer;
use crate::core::types::ChangeId;
use crate::git::Vcs;
use crate::store::Store;

use super::{EngineError, InvariantKind, NotFoundKind, PreconditionKind};

/// Everything one invocation needs to know about the current stack.
#[derive(Debug, Clone)]
pub struct StackContext {
    /// Name of the stack
    pub stack_name: String,
    /// Username segment of the stack's branches
    pub user: String,
    /// Persisted stack metadata
    pub stack: Stack,
    /// Full ordered history: merged first, then stale, then active
    pub all_changes: Vec<Change>,
    /// Unmerged changes, in order (stale-merged excluded)
    pub active_changes: Vec<Change>,
    /// Changes whose PR is merged on the forge but not yet harvested
    /// into `stack.merged_changes`
    pub stale_merged: Vec<Change>,
    /// Identity of the change being edited, if resolvable
    pub current_uuid: Option<ChangeId>,
    /// Whether the current branch is a per-change branch
    pub on_uuid_branch: bool,
    /// The branch the context was built from
    pub current_branch: String,
}

impl StackContext {
    /// The topmost active change, if any.
    pub fn top_change(&self) -> Option<&Change> {
        self.active_changes.last()
    }

    /// Index of the current change within the active changes.
    pub fn current_active_index(&self) -> Option<usize> {
        let current = self.current_uuid.as_ref()?;
        self.active_changes
            .iter()
            .position(|c| c.uuid.as_ref() == Some(current))
    }

    /// Find a change anywhere in the history by id.
    pub fn change_by_uuid(&self, uuid: &ChangeId) -> Option<&Change> {
        self.all_changes
            .iter()
            .find(|c| c.uuid.as_ref() == Some(uuid))
    }

    /// Find an active change by its full-history position.
    pub fn change_by_position(&self, position: u32) -> Option<&Change> {
        self.all_changes.iter().find(|c| c.position == position)
    }

    /// Whether the context was built on the TOP branch.
    pub fn on_top_branch(&self) -> bool {
        self.current_branch == self.stack.branch
    }
}

/// Build a context from the current branch.
///
/// Returns `Ok(None)` when the current branch is not derived from a
/// stack; most callers want [`require_context`] instead.
pub fn build_context(vcs: &dyn Vcs, store: &Store) -> Result<Option<StackContext>, EngineError> {
    let current = vcs.current_branch()?;
    let Some(stack_name) = branch::extract_stack_name(&current).map(str::to_string) else {
        return Ok(None);
    };
    build_for_stack(vcs, store, &stack_name, &current).map(Some)
}

/// Build a context or fail with *not-a-stack-branch*.
pub fn require_context(vcs: &dyn Vcs, store: &Store) -> Result<StackContext, EngineError> {
    match build_context(vcs, store)? {
        Some(ctx) => Ok(ctx),
        None => Err(EngineError::Precondition(PreconditionKind::NotAStackBranch {
            branch: vcs.current_branch()?,
        })),
    }
}

/// Build a context for a named stack, independent of the current branch.
///
/// `current_branch` is the branch the invocation is on; pass the stack's
/// own TOP branch when scanning stacks that are not checked out.
pub fn build_for_stack(
    vcs: &dyn Vcs,
    store: &Store,
    stack_name: &str,
    current_branch: &str,
) -> Result<StackContext, EngineError> {
    let stack = store
        .load_stack(stack_name)?
        .ok_or_else(|| EngineError::NotFound(NotFoundKind::Stack {
            name: stack_name.to_string(),
        }))?;
    let prs = store.load_prs(stack_name)?;

    let user = stack
        .user()
        .ok_or_else(|| EngineError::Invariant(InvariantKind::MalformedBranch {
            branch: stack.branch.clone(),
        }))?
        .to_string();

    let merged_uuids = stack.merged_uuids();

    // Working changes: one per commit in base..TOP, oldest first.
    let commits = vcs.commits_between(&stack.base, &stack.branch)?;
    let mut seen: BTreeSet<ChangeId> = BTreeSet::new();
    let mut working: Vec<Change> = Vec::new();
    for commit in commits {
        let parsed = trailer::parse_message(&commit.message);
        let uuid = parsed.pr_uuid();
        if let Some(id) = &uuid {
            if !seen.insert(id.clone()) {
                return Err(EngineError::Invariant(InvariantKind::DuplicateUuid {
                    uuid: id.to_string(),
                }));
            }
            // Already harvested: the commit will drop from the range on
            // the next rebase, and it is already represented in
            // merged_changes.
            if merged_uuids.contains(id) {
                continue;
            }
        }
        let foreign_stack = parsed
            .pr_stack()
            .filter(|s| *s != stack_name)
            .map(String::from);
        let pr = uuid.as_ref().and_then(|id| prs.prs.get(id)).cloned();
        working.push(Change {
            position: 0,
            active_position: 0,
            title: parsed.title,
            description: parsed.body,
            commit_hash: commit.hash,
            uuid,
            desired_base: String::new(),
            pr,
            is_merged: false,
            merged_at: None,
            foreign_stack,
        });
    }

    // Stale merged: on the TOP branch but already merged on the forge.
    // Treated as merged everywhere except `stack.merged_changes`.
    for change in &mut working {
        if change.pr_merged() {
            change.is_merged = true;
        }
    }

    // Full history with contiguous numbering.
    let mut all: Vec<Change> = stack
        .merged_changes
        .iter()
        .cloned()
        .map(|mut c| {
            c.is_merged = true;
            c.pr = c.uuid.as_ref().and_then(|id| prs.prs.get(id)).cloned();
            c
        })
        .collect();
    all.extend(working);
    renumber(&mut all);

    let harvested: BTreeSet<ChangeId> = merged_uuids;
    let mut active: Vec<Change> = Vec::new();
    let mut stale_merged: Vec<Change> = Vec::new();
    for change in &all {
        if change.is_merged {
            let already_harvested = change
                .uuid
                .as_ref()
                .is_some_and(|id| harvested.contains(id));
            if !already_harvested {
                stale_merged.push(change.clone());
            }
        } else {
            active.push(change.clone());
        }
    }
    compute_desired_bases(&mut active, &user, stack_name, &stack.base);

    let on_uuid_branch = branch::is_uuid_branch(current_branch);
    let current_uuid = if on_uuid_branch {
        branch::extract_uuid(current_branch)
    } else if current_branch == stack.branch {
        active.last().and_then(|c| c.uuid.clone())
    } else {
        None
    };

    Ok(StackContext {
        stack_name: stack_name.to_string(),
        user,
        stack,
        all_changes: all,
        active_changes: active,
        stale_merged,
        current_uuid,
        on_uuid_branch,
        current_branch: current_branch.to_string(),
    })
}
