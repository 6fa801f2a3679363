//! cli::commands::push
//!
//! Push the stack to the forge: create and update PRs bottom-up.
//!
//! When invoked from the TOP branch with a clean tree, a refresh runs
//! first if the sync-status predicate says one is due, so pushes never
//! target a base the forge has already merged away.

use anyhow::Result;

use crate::engine::push::{self as engine_push, PushOptions};
use crate::engine::{build_context, refresh, require_context};
use crate::git::Vcs;
use crate::ui::output;

use super::{explain_conflict, forge_for_stack, open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the push command.
pub fn push(ctx: &Context, draft: bool) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let mut sctx = require_context(&repo, &store)?;
    let forge = forge_for_stack(&repo, &sctx.stack)?;
    let v = verbosity(ctx);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        // Reconcile first when possible; merged-below changes would
        // otherwise be pushed against vanished bases.
        if sctx.on_top_branch() && !repo.has_uncommitted_changes()? {
            match refresh::maybe_refresh(&repo, &store, &forge, &sctx).await {
                Ok(Some(outcome)) => {
                    for warning in &outcome.warnings {
                        output::warn(warning, v);
                    }
                    if !outcome.harvested.is_empty() {
                        output::print(
                            format!("{} change(s) merged; stack rebased", outcome.harvested.len()),
                            v,
                        );
                    }
                    sctx = build_context(&repo, &store)?
                        .ok_or_else(|| anyhow::anyhow!("stack branch disappeared during refresh"))?;
                }
                Ok(None) => {}
                Err(e) => {
                    explain_conflict(&e);
                    return Err(e.into());
                }
            }
        }

        let outcome = engine_push::push(&repo, &store, &forge, &sctx, PushOptions { draft }).await?;
        for warning in &outcome.warnings {
            output::warn(warning, v);
        }
        for number in &outcome.created {
            output::print(format!("created PR #{number}"), v);
        }
        for number in &outcome.updated {
            output::print(format!("updated PR #{number}"), v);
        }
        if outcome.created.is_empty() && outcome.updated.is_empty() {
            output::print("everything up to date", v);
        }
        Ok(())
    })
}
