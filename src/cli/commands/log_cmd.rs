//! cli::commands::log_cmd
//!
//! Show the current stack: positions, titles, PR states, and the
//! current change marker.

use anyhow::Result;

use crate::engine::require_context;
use crate::ui::output;

use super::{open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the log command.
pub fn log(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let sctx = require_context(&repo, &store)?;
    let v = verbosity(ctx);

    output::print(
        format!("stack '{}' on '{}'", sctx.stack_name, sctx.stack.base),
        v,
    );

    if sctx.all_changes.is_empty() {
        output::print("  (no changes yet; commit on this branch to add one)", v);
        return Ok(());
    }

    for change in &sctx.all_changes {
        let marker = if change.uuid.is_some() && change.uuid == sctx.current_uuid {
            "*"
        } else {
            " "
        };
        let pr = match &change.pr {
            Some(pr) if pr.on_forge() => format!("#{} {}", pr.pr_number, pr.state),
            _ => "unpushed".to_string(),
        };
        let id = change
            .uuid
            .as_ref()
            .map_or("no-trailer".to_string(), |u| u.to_string());
        let flags = if change.is_merged {
            " [merged]"
        } else if change.foreign_stack.is_some() {
            " [foreign]"
        } else {
            ""
        };
        output::print(
            format!(
                "{marker} {:>2}. {}  ({}, {}){}",
                change.position, change.title, id, pr, flags
            ),
            v,
        );
    }
    Ok(())
}
