//! engine
//!
//! The stack engine: context derivation, navigation, refresh/merge
//! detection, push/sync, lifecycle operations, and rebase recovery.
//!
//! # Architecture
//!
//! Every command follows the same short-lived shape:
//!
//! ```text
//! build context -> (optionally refresh from forge) -> one operation -> persist
//! ```
//!
//! The engine consumes the [`Vcs`](crate::git::Vcs) and
//! [`Forge`](crate::forge::Forge) traits and the [`Store`](crate::store::Store);
//! it never talks to git2, the git binary, or HTTP directly.
//!
//! # Ordering guarantees
//!
//! Within one command, changes are processed strictly bottom-up (by
//! active position), and persisted state is written only after the VCS
//! step it reflects has succeeded. A crash therefore leaves the
//! filesystem consistent with the repository.
//!
//! # Errors
//!
//! [`EngineError`] carries the full taxonomy as structured kinds rather
//! than strings, so the CLI can choose exit codes and phrasing without
//! parsing messages.

pub mod context;
pub mod lifecycle;
pub mod navigate;
pub mod push;
pub mod recovery;
pub mod refresh;

pub use context::{build_context, build_for_stack, require_context, StackContext};

use thiserror::Error;

use crate::core::types::TypeError;
use crate::forge::ForgeError;
use crate::git::GitError;
use crate::store::StoreError;

/// Precondition failures: the operation was refused before touching
/// anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionKind {
    #[error("branch '{branch}' is not part of a stack; check out a stack branch first")]
    NotAStackBranch { branch: String },

    #[error("this operation runs on the stack's TOP branch (currently on '{branch}')")]
    NotOnTopBranch { branch: String },

    #[error("the working tree has uncommitted changes; commit or stash them first")]
    DirtyWorkingTree,

    #[error("change #{position} has no PR-UUID trailer and cannot be edited by id")]
    MissingUuidTrailer { position: u32 },

    #[error("change #{position} is already merged")]
    ChangeAlreadyMerged { position: u32 },

    #[error("change #{position} belongs to stack '{stack}' and cannot be edited here")]
    ForeignChange { position: u32, stack: String },

    #[error("this repository is not set up for stacks; run 'cairn install' first")]
    NotInstalled,

    #[error("base branch '{base}' no longer exists on the remote")]
    MissingBase { base: String },

    #[error("a stack named '{name}' already exists")]
    StackExists { name: String },

    #[error("a rebase is still in progress; resolve it (git rebase --continue) and retry")]
    RebaseInProgress,

    #[error("hook '{path}' already exists and was not installed by cairn; move it aside first")]
    HookConflict { path: String },
}

/// Referenced things that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundKind {
    #[error("stack '{name}' not found")]
    Stack { name: String },

    #[error("no PR found for {reference}")]
    Pr { reference: String },
}

/// Violated structural invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantKind {
    #[error(
        "PR #{pr_number} (position {merged_position}) merged before position \
         {unmerged_position}; merges must be bottom-up. Revert the merge or \
         rebase the stack manually, then refresh again"
    )]
    OutOfOrderMerge {
        pr_number: u64,
        merged_position: u32,
        unmerged_position: u32,
    },

    #[error("duplicate PR-UUID trailer '{uuid}' in the stack")]
    DuplicateUuid { uuid: String },

    #[error("malformed stack branch name: {branch}")]
    MalformedBranch { branch: String },
}

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A precondition was not met; nothing was mutated.
    #[error("{0}")]
    Precondition(PreconditionKind),

    /// A referenced stack or PR does not exist.
    #[error("{0}")]
    NotFound(NotFoundKind),

    /// A structural invariant was violated.
    #[error("{0}")]
    Invariant(InvariantKind),

    /// A user-provided name failed validation.
    #[error(transparent)]
    InvalidType(#[from] TypeError),

    /// VCS adapter failure (rebase conflicts are a distinguished subkind).
    #[error(transparent)]
    Vcs(#[from] GitError),

    /// Forge adapter failure.
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// Persistent store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether this error is a rebase conflict that left the repository
    /// mid-rebase with a recovery record on disk.
    pub fn is_rebase_conflict(&self) -> bool {
        matches!(self, EngineError::Vcs(GitError::RebaseConflict { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_messages_are_actionable() {
        let err = EngineError::Precondition(PreconditionKind::NotInstalled);
        assert!(err.to_string().contains("cairn install"));

        let err = EngineError::Precondition(PreconditionKind::DirtyWorkingTree);
        assert!(err.to_string().contains("stash"));
    }

    #[test]
    fn out_of_order_merge_mentions_both_positions() {
        let err = EngineError::Invariant(InvariantKind::OutOfOrderMerge {
            pr_number: 102,
            merged_position: 2,
            unmerged_position: 1,
        });
        let message = err.to_string();
        assert!(message.contains("#102"));
        assert!(message.contains("position 2"));
        assert!(message.contains("bottom-up"));
    }

    #[test]
    fn rebase_conflict_is_distinguishable() {
        let err = EngineError::Vcs(GitError::RebaseConflict {
            onto: "origin/main".into(),
        });
        assert!(err.is_rebase_conflict());

        let err = EngineError::Vcs(GitError::DetachedHead);
        assert!(!err.is_rebase_conflict());
    }

    #[test]
    fn wrapped_errors_keep_their_messages() {
        let err = EngineError::Store(StoreError::Parse {
            path: "/x/prs.json".into(),
            message: "trailing comma".into(),
        });
        assert!(err.to_string().contains("prs.json"));
    }
}
