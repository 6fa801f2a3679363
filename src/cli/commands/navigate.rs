//! cli::commands::navigate
//!
//! up / down / top / bottom / edit.
//!
//! All navigation requires a clean working tree; the engine never
//! discards uncommitted work.

use anyhow::Result;

use crate::engine::{navigate, require_context};

use super::{open_repo, open_store, report_nav, require_clean};
use crate::cli::Context;

/// Move one change towards the top.
pub fn up(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    require_clean(&repo)?;
    let sctx = require_context(&repo, &store)?;
    let outcome = navigate::up(&repo, &sctx)?;
    report_nav(ctx, &outcome);
    Ok(())
}

/// Move one change towards the base.
pub fn down(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    require_clean(&repo)?;
    let sctx = require_context(&repo, &store)?;
    let outcome = navigate::down(&repo, &sctx)?;
    report_nav(ctx, &outcome);
    Ok(())
}

/// Jump to the top change.
pub fn top(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    require_clean(&repo)?;
    let sctx = require_context(&repo, &store)?;
    let outcome = navigate::top(&repo, &sctx)?;
    report_nav(ctx, &outcome);
    Ok(())
}

/// Jump to the bottom change.
pub fn bottom(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    require_clean(&repo)?;
    let sctx = require_context(&repo, &store)?;
    let outcome = navigate::bottom(&repo, &sctx)?;
    report_nav(ctx, &outcome);
    Ok(())
}

/// Check out the change at a given position for editing.
pub fn edit(ctx: &Context, position: u32) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    require_clean(&repo)?;
    let sctx = require_context(&repo, &store)?;
    let change = super::resolve_change(&sctx, Some(position))?;
    let outcome = navigate::checkout_for_editing(&repo, &sctx, &change)?;
    report_nav(ctx, &outcome);
    Ok(())
}
