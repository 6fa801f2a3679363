//! cli::commands::install
//!
//! Set up a repository: install the commit-msg hook and write the
//! install record.

use anyhow::Result;

use crate::engine::lifecycle;
use crate::ui::output;

use super::{open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the install command.
pub fn install(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);

    let outcome = lifecycle::install(&repo, &store)?;
    let v = verbosity(ctx);
    if outcome.already_installed {
        output::print(
            format!("refreshed hook at {}", outcome.hook_path.display()),
            v,
        );
    } else {
        output::print(
            format!("installed hook at {}", outcome.hook_path.display()),
            v,
        );
        output::print("create your first stack with 'cairn create <name>'", v);
    }
    Ok(())
}
