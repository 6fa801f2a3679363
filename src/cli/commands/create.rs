//! cli::commands::create
//!
//! Create a new stack on top of a base branch.

use anyhow::Result;

use crate::engine::lifecycle;
use crate::git::Vcs;
use crate::ui::output;

use super::{forge_from_remote, open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the create command.
///
/// The base defaults to the branch the command was started on.
pub fn create(ctx: &Context, name: &str, base: Option<&str>) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let forge = forge_from_remote(&repo)?;

    let base = match base {
        Some(base) => base.to_string(),
        None => repo.current_branch()?,
    };

    let rt = tokio::runtime::Runtime::new()?;
    let stack = rt.block_on(lifecycle::create_stack(&repo, &store, &forge, name, &base))?;

    let v = verbosity(ctx);
    output::print(
        format!("created stack '{}' on '{}'", stack.name, stack.base),
        v,
    );
    output::print(format!("now on {}", stack.branch), v);
    output::print(
        "commit changes here; each commit becomes one PR on push",
        v,
    );
    Ok(())
}
