//! cli::commands::restack
//!
//! Rebase the stack onto the freshly-fetched base branch.

use anyhow::Result;

use crate::engine::{lifecycle, require_context};
use crate::ui::output;

use super::{explain_conflict, open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the restack command.
pub fn restack(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let sctx = require_context(&repo, &store)?;

    let outcome = lifecycle::restack(&repo, &store, &sctx).inspect_err(explain_conflict)?;
    output::print(
        format!(
            "restacked '{}' onto {} ({})",
            sctx.stack_name,
            sctx.stack.base,
            outcome.base_ref.short(7)
        ),
        verbosity(ctx),
    );
    Ok(())
}
