//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve the repository, store, and forge adapter
//! - Delegate to the engine and format its outcomes
//!
//! The CLI layer is thin: repository mutations and forge traffic flow
//! through [`crate::engine`] exclusively.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, HookCommand};

use std::path::PathBuf;

use anyhow::Result;

/// Execution context derived from global CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let ctx = Context {
        cwd: cli.cwd.clone(),
        quiet: cli.quiet,
    };
    commands::dispatch(cli.command, &ctx)
}
