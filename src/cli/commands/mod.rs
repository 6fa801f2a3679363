//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each handler:
//! 1. Opens the repository and store
//! 2. Builds a stack context when the command needs one
//! 3. Calls the engine and prints the outcome
//!
//! # Async Commands
//!
//! Forge-touching commands (create, push, refresh, draft/ready) are
//! async because they involve network I/O; each wraps its async body in
//! a tokio runtime.

mod cleanup;
mod completion;
mod create;
mod delete;
mod hook;
mod install;
mod list;
mod log_cmd;
mod navigate;
mod open;
mod push;
mod recover;
mod refresh;
mod restack;
mod stack_draft;
mod switch;

pub use cleanup::cleanup;
pub use completion::completion;
pub use create::create;
pub use delete::delete;
pub use hook::hook_commit_msg;
pub use install::install;
pub use list::list;
pub use log_cmd::log;
pub use navigate::{bottom, down, edit, top, up};
pub use open::open;
pub use push::push;
pub use recover::recover;
pub use refresh::refresh;
pub use restack::restack;
pub use stack_draft::{draft, ready};

use anyhow::{bail, Context as _, Result};

use crate::core::model::Stack;
use crate::engine::{self, StackContext};
use crate::forge::github::GitHubForge;
use crate::git::{GitRepo, Vcs};
use crate::store::Store;
use crate::ui::output::{self, Verbosity};

use super::args::{Command, HookCommand};
use super::Context;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Install => install(ctx),
        Command::Create { name, base } => create(ctx, &name, base.as_deref()),
        Command::Switch { name } => switch::switch(ctx, &name),
        Command::Delete { name } => delete(ctx, &name),
        Command::List => list(ctx),
        Command::Log => log(ctx),
        Command::Up => up(ctx),
        Command::Down => down(ctx),
        Command::Top => top(ctx),
        Command::Bottom => bottom(ctx),
        Command::Edit { position } => edit(ctx, position),
        Command::Push { draft } => push(ctx, draft),
        Command::Refresh => refresh(ctx),
        Command::Restack => restack(ctx),
        Command::Draft { position } => draft(ctx, position),
        Command::Ready { position } => ready(ctx, position),
        Command::Open { position } => open(ctx, position),
        Command::Recover { abort, continue_ } => recover(ctx, abort, continue_),
        Command::Cleanup { apply } => cleanup(ctx, apply),
        Command::Hook { hook } => match hook {
            HookCommand::CommitMsg { file } => hook_commit_msg(ctx, &file),
        },
        Command::Completion { shell } => completion(shell),
    }
}

// =============================================================================
// Shared plumbing
// =============================================================================

/// Open the repository the command runs against.
pub(crate) fn open_repo(ctx: &Context) -> Result<GitRepo> {
    let cwd = match &ctx.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("could not determine working directory")?,
    };
    Ok(GitRepo::discover(&cwd)?)
}

/// Open the store for a repository.
pub(crate) fn open_store(repo: &GitRepo) -> Store {
    Store::open(&repo.git_common_dir())
}

/// Verbosity from the global flags.
pub(crate) fn verbosity(ctx: &Context) -> Verbosity {
    Verbosity::from_quiet(ctx.quiet)
}

/// Resolve the GitHub token from the environment.
///
/// The engine itself never reads environment variables; token
/// resolution lives here at the CLI boundary.
pub(crate) fn github_token() -> Result<String> {
    for key in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(key) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
    }
    bail!("no GitHub token found; set GITHUB_TOKEN (or GH_TOKEN)")
}

/// Build a forge adapter for an existing stack (cached identity).
pub(crate) fn forge_for_stack(repo: &GitRepo, stack: &Stack) -> Result<GitHubForge> {
    let token = github_token()?;
    if !stack.owner.is_empty() && !stack.repo_name.is_empty() {
        return Ok(GitHubForge::new(token, &stack.owner, &stack.repo_name));
    }
    forge_from_remote_with_token(repo, token)
}

/// Build a forge adapter from the repository's remote URL.
pub(crate) fn forge_from_remote(repo: &GitRepo) -> Result<GitHubForge> {
    forge_from_remote_with_token(repo, github_token()?)
}

fn forge_from_remote_with_token(repo: &GitRepo, token: String) -> Result<GitHubForge> {
    let remote = repo.remote_name()?;
    let url = repo
        .remote_url(&remote)?
        .with_context(|| format!("remote '{remote}' has no URL"))?;
    GitHubForge::from_remote_url(&url, token)
        .with_context(|| format!("remote '{url}' is not a GitHub repository"))
}

/// Require a clean working tree before a navigation or rewrite.
pub(crate) fn require_clean(repo: &GitRepo) -> Result<()> {
    if repo.has_uncommitted_changes()? {
        return Err(engine::EngineError::Precondition(
            engine::PreconditionKind::DirtyWorkingTree,
        )
        .into());
    }
    Ok(())
}

/// Resolve a change by position, falling back to the current change.
pub(crate) fn resolve_change(
    sctx: &StackContext,
    position: Option<u32>,
) -> Result<crate::core::model::Change> {
    if let Some(position) = position {
        return sctx
            .change_by_position(position)
            .cloned()
            .with_context(|| format!("no change at position {position}"));
    }
    let uuid = sctx
        .current_uuid
        .clone()
        .context("no current change; pass a position (see 'cairn log')")?;
    sctx.change_by_uuid(&uuid)
        .cloned()
        .context("the current change is not part of this stack")
}

/// Print a navigation outcome.
pub(crate) fn report_nav(ctx: &Context, outcome: &engine::navigate::NavOutcome) {
    let v = verbosity(ctx);
    for warning in &outcome.warnings {
        output::warn(warning, v);
    }
    if let Some(branch) = &outcome.branch {
        output::print(format!("switched to {branch}"), v);
    }
}

/// Extra guidance when a rebase stopped on conflicts.
pub(crate) fn explain_conflict(err: &engine::EngineError) {
    if err.is_rebase_conflict() {
        output::error(
            "the rebase stopped on conflicts; resolve them and run \
             'git rebase --continue', then 'cairn recover --continue' \
             (or roll back with 'cairn recover --abort')",
        );
    }
}
