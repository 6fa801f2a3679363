//! engine::recovery
//!
//! Rebase-recovery records for interrupted multi-step VCS mutations.
//!
//! # Protocol
//!
//! Before an operation that rewrites the TOP branch (the refresh rebase,
//! a restack onto a new base), the engine persists a [`RebaseState`]
//! capturing the pre-operation head. If the operation completes, the
//! record is deleted. If it is interrupted (a conflict, a crash, a
//! cancelled command), the record survives, and a later invocation can
//! either roll the TOP branch back to the recorded head or confirm the
//! user finished the rebase and clear the record.

use chrono::Utc;

use crate::core::model::{RebaseState, Stack};
use crate::core::types::Oid;
use crate::git::Vcs;
use crate::store::Store;

use super::{EngineError, PreconditionKind};

/// Capture the pre-operation head and persist a recovery record.
///
/// `new_commit` / `old_commit` describe the rewrite being propagated
/// when the guarded operation is an amend-propagation; plain rebases
/// pass `None`.
pub fn begin(
    vcs: &dyn Vcs,
    store: &Store,
    stack: &Stack,
    new_commit: Option<Oid>,
    old_commit: Option<Oid>,
) -> Result<RebaseState, EngineError> {
    let head = vcs.commit_hash(&stack.branch)?;
    let state = RebaseState {
        original_stack_head: head,
        new_commit_hash: new_commit,
        old_commit_hash: old_commit,
        stack_branch: stack.branch.clone(),
        timestamp: Utc::now(),
    };
    store.save_rebase_state(&stack.name, &state)?;
    Ok(state)
}

/// Delete the recovery record after a successful operation.
pub fn finish(store: &Store, stack_name: &str) -> Result<(), EngineError> {
    store.clear_rebase_state(stack_name)?;
    Ok(())
}

/// Load a pending recovery record, if any.
pub fn pending(store: &Store, stack_name: &str) -> Result<Option<RebaseState>, EngineError> {
    Ok(store.load_rebase_state(stack_name)?)
}

/// Roll the stack back to the recorded pre-operation head.
///
/// Aborts any in-progress rebase first, then hard-resets the TOP branch
/// and clears the record.
pub fn abort(
    vcs: &dyn Vcs,
    store: &Store,
    stack_name: &str,
    state: &RebaseState,
) -> Result<Oid, EngineError> {
    if vcs.rebase_in_progress()? {
        vcs.abort_rebase()?;
    }
    vcs.checkout_branch(&state.stack_branch)?;
    vcs.reset_hard(state.original_stack_head.as_str())?;
    store.clear_rebase_state(stack_name)?;
    Ok(state.original_stack_head.clone())
}

/// Confirm the user resolved the interrupted operation and clear the
/// record.
///
/// # Errors
///
/// *rebase-in-progress* if the repository is still mid-rebase.
pub fn resume(
    vcs: &dyn Vcs,
    store: &Store,
    stack_name: &str,
) -> Result<(), EngineError> {
    if vcs.rebase_in_progress()? {
        return Err(EngineError::Precondition(PreconditionKind::RebaseInProgress));
    }
    store.clear_rebase_state(stack_name)?;
    Ok(())
}
