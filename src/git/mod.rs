//! git
//!
//! The VCS adapter: the single doorway to all Git operations.
//!
//! # Architecture
//!
//! The engine sees Git only through the [`Vcs`] trait, a narrow contract
//! covering branches, commits, checkout, rebase, reset, fetch, and push.
//! The production implementation is [`GitRepo`]; tests use
//! [`mock::MockVcs`].
//!
//! No module outside this one may import `git2` or spawn the `git`
//! binary directly.

pub mod interface;
pub mod mock;

pub use interface::{CommitInfo, GitError, GitRepo, Vcs};
