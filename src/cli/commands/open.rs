//! cli::commands::open
//!
//! Open a change's PR in the browser.

use anyhow::Result;

use crate::engine::{require_context, EngineError, NotFoundKind};
use crate::forge::Forge as _;
use crate::ui::output;

use super::{forge_for_stack, open_repo, open_store, resolve_change, verbosity};
use crate::cli::Context;

/// Run the open command.
pub fn open(ctx: &Context, position: Option<u32>) -> Result<()> {
    let repo = open_repo(ctx)?;
    let store = open_store(&repo);
    let sctx = require_context(&repo, &store)?;
    let change = resolve_change(&sctx, position)?;

    let Some(number) = change.pr_number() else {
        return Err(EngineError::NotFound(NotFoundKind::Pr {
            reference: format!("change #{}", change.position),
        })
        .into());
    };

    let forge = forge_for_stack(&repo, &sctx.stack)?;
    forge.open_pr(number)?;
    output::print(format!("opened PR #{number}"), verbosity(ctx));
    Ok(())
}
