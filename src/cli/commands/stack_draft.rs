//! cli::commands::stack_draft
//!
//! Mark a change's PR as draft or ready for review.

use anyhow::Result;

use crate::engine::{push as engine_push, require_context};
use crate::ui::output;

use super::{forge_for_stack, open_repo, open_store, resolve_change, verbosity};
use crate::cli::Context;

/// Run the draft command.
pub fn draft(ctx: &Context, position: Option<u32>) -> Result<()> {
    set_draft(ctx, position, true)
}

/// Run the ready command.
pub fn ready(ctx: &Context, position: Option<u32>) -> Result<()> {
    set_draft(ctx, position, false)
}

fn set_draft(ctx: &Context, position: Option<u32>, draft: bool) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let sctx = require_context(&repo, &store)?;
    let forge = forge_for_stack(&repo, &sctx.stack)?;
    let change = resolve_change(&sctx, position)?;
    let v = verbosity(ctx);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(engine_push::set_change_draft(
        &store, &forge, &sctx, &change, draft,
    ))?;

    for warning in &outcome.warnings {
        output::warn(warning, v);
    }
    let word = if draft { "draft" } else { "ready for review" };
    match outcome.pr_number {
        Some(number) if outcome.transitioned => {
            output::print(format!("PR #{number} is now {word}"), v);
        }
        Some(_) => {}
        None => {
            output::print(
                format!("recorded; the PR will be created as {word} on push"),
                v,
            );
        }
    }
    Ok(())
}
