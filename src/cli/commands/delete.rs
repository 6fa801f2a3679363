//! cli::commands::delete
//!
//! Delete a stack: archive its metadata, remove its branches.

use anyhow::Result;

use crate::engine::lifecycle;
use crate::ui::output;

use super::{open_repo, open_store, require_clean, verbosity};
use crate::cli::Context;

/// Run the delete command.
pub fn delete(ctx: &Context, name: &str) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    require_clean(&repo)?;

    let outcome = lifecycle::delete_stack(&repo, &store, name)?;
    let v = verbosity(ctx);
    for warning in &outcome.warnings {
        output::warn(warning, v);
    }
    output::print(
        format!(
            "deleted stack '{name}' (archived to {})",
            outcome.archived_to.display()
        ),
        v,
    );
    Ok(())
}
