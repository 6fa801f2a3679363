//! cli::commands::switch
//!
//! Switch to another stack's TOP branch.

use anyhow::Result;

use crate::engine::lifecycle;
use crate::ui::output;

use super::{open_repo, open_store, require_clean, verbosity};
use crate::cli::Context;

/// Run the switch command.
pub fn switch(ctx: &Context, name: &str) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    require_clean(&repo)?;

    let branch = lifecycle::switch_stack(&repo, &store, name)?;
    output::print(format!("switched to {branch}"), verbosity(ctx));
    Ok(())
}
