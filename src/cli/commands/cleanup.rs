//! cli::commands::cleanup
//!
//! Find fully-merged stacks and optionally archive them.

use anyhow::Result;

use crate::engine::lifecycle;
use crate::ui::output;

use super::{open_repo, open_store, require_clean, verbosity};
use crate::cli::Context;

/// Run the cleanup command.
pub fn cleanup(ctx: &Context, apply: bool) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let v = verbosity(ctx);

    let candidates = lifecycle::cleanup_candidates(&repo, &store)?;
    if candidates.is_empty() {
        output::print("nothing to clean up", v);
        return Ok(());
    }

    if !apply {
        for candidate in &candidates {
            output::print(
                format!("{}: {}", candidate.name, candidate.reason),
                v,
            );
        }
        output::print("re-run with --apply to archive these stacks", v);
        return Ok(());
    }

    require_clean(&repo)?;
    for candidate in &candidates {
        let outcome = lifecycle::delete_stack(&repo, &store, &candidate.name)?;
        for warning in &outcome.warnings {
            output::warn(warning, v);
        }
        output::print(
            format!(
                "archived '{}' ({})",
                candidate.name, candidate.reason
            ),
            v,
        );
    }
    Ok(())
}
