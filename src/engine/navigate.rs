//! engine::navigate
//!
//! Checkout-for-editing and the up/down/top/bottom protocol.
//!
//! # Design
//!
//! Editing a change means checking out a branch that points at its
//! commit:
//!
//! - The top active change is edited directly on the TOP branch.
//! - Any other change gets an ephemeral per-change branch at its commit.
//!   If the branch already exists but points at a stale commit (a
//!   previous amend moved the TOP history), it is hard-reset to the
//!   current commit with a warning.
//!
//! The working tree is never touched beyond checkout/reset; callers
//! guarantee a clean tree before navigating.

use crate::core::branch;
use crate::core::model::Change;
use crate::git::Vcs;

use super::context::StackContext;
use super::{EngineError, PreconditionKind};

/// Result of a navigation operation.
#[derive(Debug, Clone, Default)]
pub struct NavOutcome {
    /// Branch that ended up checked out, when a checkout happened
    pub branch: Option<String>,
    /// Non-fatal messages for the user
    pub warnings: Vec<String>,
}

impl NavOutcome {
    fn noop(warning: impl Into<String>) -> Self {
        Self {
            branch: None,
            warnings: vec![warning.into()],
        }
    }
}

/// Check out a change for editing.
///
/// # Errors
///
/// - *change-already-merged* for merged changes
/// - *missing-UUID-trailer* for commits without trailers
/// - a precondition error for changes belonging to another stack
pub fn checkout_for_editing(
    vcs: &dyn Vcs,
    ctx: &StackContext,
    change: &Change,
) -> Result<NavOutcome, EngineError> {
    if change.is_merged {
        return Err(EngineError::Precondition(
            PreconditionKind::ChangeAlreadyMerged {
                position: change.position,
            },
        ));
    }
    if let Some(stack) = &change.foreign_stack {
        return Err(EngineError::Precondition(PreconditionKind::ForeignChange {
            position: change.position,
            stack: stack.clone(),
        }));
    }
    let Some(uuid) = &change.uuid else {
        return Err(EngineError::Precondition(
            PreconditionKind::MissingUuidTrailer {
                position: change.position,
            },
        ));
    };

    // The top active change lives on the TOP branch itself.
    if ctx.top_change().and_then(|c| c.uuid.as_ref()) == Some(uuid) {
        vcs.checkout_branch(&ctx.stack.branch)?;
        return Ok(NavOutcome {
            branch: Some(ctx.stack.branch.clone()),
            warnings: vec![],
        });
    }

    let name = branch::uuid_branch(&ctx.user, &ctx.stack_name, uuid);
    let mut warnings = Vec::new();
    if vcs.branch_exists(&name)? {
        let existing = vcs.commit_hash(&name)?;
        vcs.checkout_branch(&name)?;
        if existing != change.commit_hash {
            // A previous amend on TOP moved this change's commit.
            vcs.reset_hard(change.commit_hash.as_str())?;
            warnings.push(format!(
                "branch {name} pointed at {}; reset to {}",
                existing.short(7),
                change.commit_hash.short(7)
            ));
        }
    } else {
        vcs.create_and_checkout_branch_at(&name, &change.commit_hash)?;
    }

    Ok(NavOutcome {
        branch: Some(name),
        warnings,
    })
}

/// Move one change up the stack (towards the top).
///
/// At the top this is a warning, not an error.
pub fn up(vcs: &dyn Vcs, ctx: &StackContext) -> Result<NavOutcome, EngineError> {
    let Some(index) = ctx.current_active_index() else {
        return Ok(current_not_active(ctx));
    };
    if index + 1 >= ctx.active_changes.len() {
        return Ok(NavOutcome::noop("already at the top of the stack"));
    }
    checkout_for_editing(vcs, ctx, &ctx.active_changes[index + 1])
}

/// Move one change down the stack (towards the base).
pub fn down(vcs: &dyn Vcs, ctx: &StackContext) -> Result<NavOutcome, EngineError> {
    let Some(index) = ctx.current_active_index() else {
        return Ok(current_not_active(ctx));
    };
    if index == 0 {
        return Ok(NavOutcome::noop("already at the bottom of the stack"));
    }
    checkout_for_editing(vcs, ctx, &ctx.active_changes[index - 1])
}

/// Jump to the top active change (the TOP branch).
pub fn top(vcs: &dyn Vcs, ctx: &StackContext) -> Result<NavOutcome, EngineError> {
    match ctx.active_changes.last() {
        Some(change) => checkout_for_editing(vcs, ctx, change),
        None => Ok(NavOutcome::noop("the stack has no active changes")),
    }
}

/// Jump to the bottom active change.
pub fn bottom(vcs: &dyn Vcs, ctx: &StackContext) -> Result<NavOutcome, EngineError> {
    match ctx.active_changes.first() {
        Some(change) => checkout_for_editing(vcs, ctx, change),
        None => Ok(NavOutcome::noop("the stack has no active changes")),
    }
}

/// Warn-and-noop outcome for up/down when the current change is not in
/// the active set (merged, stale, or untrailered).
fn current_not_active(ctx: &StackContext) -> NavOutcome {
    let merged = ctx
        .current_uuid
        .as_ref()
        .and_then(|id| ctx.change_by_uuid(id))
        .is_some_and(|c| c.is_merged);
    if merged {
        NavOutcome::noop("the current change is already merged; try 'cairn top'")
    } else {
        NavOutcome::noop("no current change to navigate from; try 'cairn top'")
    }
}
