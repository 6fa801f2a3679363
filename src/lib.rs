//! Cairn - stacked pull requests driven by commit trailers
//!
//! Cairn manages stacks: ordered sequences of dependent changes on a
//! shared base branch, where each change is simultaneously a commit on
//! a linear TOP branch and an independent pull request based on the
//! previous change's branch.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line layer (parses args, delegates to the engine)
//! - [`engine`] - Context derivation, navigation, refresh/merge
//!   detection, push/sync, lifecycle, rebase recovery
//! - [`core`] - Domain types, the trailer codec, the branch scheme, and
//!   the stack/change/PR model (pure, no I/O)
//! - [`store`] - JSON persistence under the git common dir
//! - [`git`] - The single doorway for VCS operations
//! - [`forge`] - The abstraction over the remote hosting service
//! - [`ui`] - Output helpers and the stack-visualization comment
//!
//! # Sources of truth
//!
//! The engine mediates between three: the commits on the TOP branch,
//! the persisted metadata, and the forge's PR state. The identity of
//! the "current stack" and "current change" is always derived from the
//! current branch name; there is no separate current-stack file.

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod git;
pub mod store;
pub mod ui;
