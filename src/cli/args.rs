//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! Available on all commands:
//! - `--cwd <path>`: Run as if started in that directory
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cairn - stacked pull requests driven by commit trailers
#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if cairn was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set up this repository: install the commit-msg hook
    #[command(name = "install")]
    Install,

    /// Create a new stack on top of a base branch
    #[command(name = "create")]
    Create {
        /// Stack name
        name: String,

        /// Base branch (defaults to the current branch)
        #[arg(long)]
        base: Option<String>,
    },

    /// Switch to another stack's TOP branch
    #[command(name = "switch")]
    Switch {
        /// Stack name
        name: String,
    },

    /// Delete a stack: archive its metadata and remove its branches
    #[command(name = "delete")]
    Delete {
        /// Stack name
        name: String,
    },

    /// List stacks with their sync status
    #[command(name = "list")]
    List,

    /// Show the current stack
    #[command(name = "log")]
    Log,

    /// Move one change up the stack (towards the top)
    #[command(name = "up")]
    Up,

    /// Move one change down the stack (towards the base)
    #[command(name = "down")]
    Down,

    /// Jump to the top change
    #[command(name = "top")]
    Top,

    /// Jump to the bottom change
    #[command(name = "bottom")]
    Bottom,

    /// Check out a specific change for editing
    #[command(name = "edit")]
    Edit {
        /// Position of the change (as shown by `cairn log`)
        position: u32,
    },

    /// Push changes to the forge: create and update PRs
    #[command(name = "push")]
    Push {
        /// Create new PRs as drafts
        #[arg(long)]
        draft: bool,
    },

    /// Reconcile with the forge: detect merges and rebase onto the base
    #[command(name = "refresh")]
    Refresh,

    /// Rebase the stack onto the freshly-fetched base branch
    #[command(name = "restack")]
    Restack,

    /// Mark a change's PR as a draft
    #[command(name = "draft")]
    Draft {
        /// Position of the change (defaults to the current change)
        position: Option<u32>,
    },

    /// Mark a change's PR as ready for review
    #[command(name = "ready")]
    Ready {
        /// Position of the change (defaults to the current change)
        position: Option<u32>,
    },

    /// Open a change's PR in the browser
    #[command(name = "open")]
    Open {
        /// Position of the change (defaults to the current change)
        position: Option<u32>,
    },

    /// Inspect or resolve an interrupted rebase
    #[command(name = "recover")]
    Recover {
        /// Roll the stack back to its pre-operation state
        #[arg(long, conflicts_with = "continue_")]
        abort: bool,

        /// Confirm the rebase was resolved and clear the record
        #[arg(long = "continue")]
        continue_: bool,
    },

    /// Find (and optionally archive) fully-merged stacks
    #[command(name = "cleanup")]
    Cleanup {
        /// Archive the candidates instead of just listing them
        #[arg(long)]
        apply: bool,
    },

    /// Git hook entry points (invoked by installed hooks, not by hand)
    #[command(name = "hook", hide = true)]
    Hook {
        #[command(subcommand)]
        hook: HookCommand,
    },

    /// Generate shell completion scripts
    #[command(name = "completion")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Hook entry points.
#[derive(Subcommand, Debug)]
pub enum HookCommand {
    /// commit-msg hook: inject stack trailers into the message file
    #[command(name = "commit-msg")]
    CommitMsg {
        /// Path to the message file git hands the hook
        file: PathBuf,
    },
}
