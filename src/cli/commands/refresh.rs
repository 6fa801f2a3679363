//! cli::commands::refresh
//!
//! Reconcile with the forge: detect merged PRs, roll them off the
//! active set, and rebase the stack onto the updated base.

use anyhow::Result;

use crate::engine::{refresh as engine_refresh, require_context};
use crate::ui::output;

use super::{explain_conflict, forge_for_stack, open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the refresh command.
pub fn refresh(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let sctx = require_context(&repo, &store)?;
    let forge = forge_for_stack(&repo, &sctx.stack)?;
    let v = verbosity(ctx);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt
        .block_on(engine_refresh::refresh(&repo, &store, &forge, &sctx))
        .inspect_err(explain_conflict)?;

    for warning in &outcome.warnings {
        output::warn(warning, v);
    }
    if outcome.harvested.is_empty() {
        output::print("nothing merged; stack rebased onto its base", v);
    } else {
        for change in &outcome.harvested {
            output::print(
                format!("merged: #{} {}", change.position, change.title),
                v,
            );
        }
    }
    Ok(())
}
