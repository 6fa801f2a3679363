//! cli::commands::recover
//!
//! Inspect or resolve an interrupted stack rebase.
//!
//! Recovery cannot rely on the current branch: a conflicted rebase
//! leaves HEAD detached. The command instead scans all stacks for a
//! pending recovery record.

use anyhow::{bail, Result};

use crate::engine::recovery;
use crate::ui::output;

use super::{open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the recover command.
pub fn recover(ctx: &Context, abort: bool, continue_: bool) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let v = verbosity(ctx);

    let mut pending = Vec::new();
    for name in store.list_stacks()? {
        if let Some(state) = recovery::pending(&store, &name)? {
            pending.push((name, state));
        }
    }

    let Some((name, state)) = pending.into_iter().next() else {
        output::print("no interrupted operation to recover", v);
        return Ok(());
    };

    if abort {
        let restored = recovery::abort(&repo, &store, &name, &state)?;
        output::print(
            format!(
                "rolled '{name}' back to {} on {}",
                restored.short(7),
                state.stack_branch
            ),
            v,
        );
    } else if continue_ {
        recovery::resume(&repo, &store, &name)?;
        output::print(format!("cleared the recovery record for '{name}'"), v);
    } else {
        output::print(
            format!(
                "stack '{name}' has an interrupted operation from {} (was at {})",
                state.timestamp,
                state.original_stack_head.short(7)
            ),
            v,
        );
        bail!("pass --continue after resolving, or --abort to roll back");
    }
    Ok(())
}
