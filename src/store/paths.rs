//! store::paths
//!
//! Centralized path routing for the persistent store.
//!
//! # Storage Layout
//!
//! All stack data lives under `<git-common-dir>/stack/`:
//!
//! ```text
//! config.json                 # RepositoryConfig (install record)
//! <name>/config.json          # Stack metadata
//! <name>/prs.json             # PR records keyed by change id
//! <name>/rebase-state.json    # optional recovery record
//! .archived/<name>-<ts>/      # archived stacks
//! ```
//!
//! Using the *common* git dir (not the per-worktree git dir) keeps stack
//! state shared across linked worktrees. No code outside this module may
//! compute store paths by hand.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Name of the store directory under the git common dir.
const STORE_DIR: &str = "stack";

/// Name of the archive directory under the store root.
const ARCHIVE_DIR: &str = ".archived";

/// Path routing for the persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Create path routing rooted at `<git_common_dir>/stack/`.
    ///
    /// # Example
    ///
    /// ```
    /// use cairn::store::paths::StorePaths;
    /// use std::path::{Path, PathBuf};
    ///
    /// let paths = StorePaths::new(Path::new("/repo/.git"));
    /// assert_eq!(paths.root(), Path::new("/repo/.git/stack"));
    /// assert_eq!(
    ///     paths.stack_config("feat-auth"),
    ///     PathBuf::from("/repo/.git/stack/feat-auth/config.json")
    /// );
    /// ```
    pub fn new(git_common_dir: &Path) -> Self {
        Self {
            root: git_common_dir.join(STORE_DIR),
        }
    }

    /// The store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `config.json`: the repository install record.
    pub fn repo_config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Directory holding one stack's files.
    pub fn stack_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// `<name>/config.json`: stack metadata.
    pub fn stack_config(&self, name: &str) -> PathBuf {
        self.stack_dir(name).join("config.json")
    }

    /// `<name>/prs.json`: PR records.
    pub fn prs(&self, name: &str) -> PathBuf {
        self.stack_dir(name).join("prs.json")
    }

    /// `<name>/rebase-state.json`: optional recovery record.
    pub fn rebase_state(&self, name: &str) -> PathBuf {
        self.stack_dir(name).join("rebase-state.json")
    }

    /// The archive directory.
    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    /// Target directory for archiving a stack at a given instant.
    ///
    /// # Example
    ///
    /// ```
    /// use cairn::store::paths::StorePaths;
    /// use chrono::{TimeZone, Utc};
    /// use std::path::Path;
    ///
    /// let paths = StorePaths::new(Path::new("/repo/.git"));
    /// let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    /// assert_eq!(
    ///     paths.archive_target("feat-auth", &ts),
    ///     Path::new("/repo/.git/stack/.archived/feat-auth-20240301T120000Z")
    /// );
    /// ```
    pub fn archive_target(&self, name: &str, at: &DateTime<Utc>) -> PathBuf {
        self.archive_dir()
            .join(format!("{}-{}", name, at.format("%Y%m%dT%H%M%SZ")))
    }
}
