//! cli::commands::list
//!
//! List stacks with change counts and sync status.

use anyhow::Result;

use crate::core::branch;
use crate::engine::context::build_for_stack;
use crate::engine::refresh::check_sync_status;
use crate::git::Vcs;
use crate::ui::output;

use super::{open_repo, open_store, verbosity};
use crate::cli::Context;

/// Run the list command.
pub fn list(ctx: &Context) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let v = verbosity(ctx);

    let names = store.list_stacks()?;
    if names.is_empty() {
        output::print("no stacks; create one with 'cairn create <name>'", v);
        return Ok(());
    }

    let current_stack = repo
        .current_branch()
        .ok()
        .and_then(|b| branch::extract_stack_name(&b).map(String::from));

    for name in names {
        let Some(stack) = store.load_stack(&name)? else {
            continue;
        };
        let marker = if current_stack.as_deref() == Some(name.as_str()) {
            "*"
        } else {
            " "
        };
        let status = check_sync_status(&repo, &stack);
        let counts = match build_for_stack(&repo, &store, &name, &stack.branch) {
            Ok(sctx) => format!(
                "{} active, {} merged",
                sctx.active_changes.len(),
                sctx.all_changes.len() - sctx.active_changes.len()
            ),
            Err(_) => "unreadable".to_string(),
        };
        output::print(
            format!("{marker} {name}  ({counts}; {status})  -> {}", stack.base),
            v,
        );
    }
    Ok(())
}
