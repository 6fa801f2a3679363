//! git::mock
//!
//! Mock VCS implementation for deterministic testing.
//!
//! # Design
//!
//! The mock keeps a branch map, a scripted commit range per branch, and a
//! log of every mutating operation, so engine tests can assert both on
//! resulting state and on the exact sequence of VCS calls. Failure
//! scenarios (rebase conflict, push rejection, fetch failure) are
//! scripted via [`FailOn`].
//!
//! # Example
//!
//! ```
//! use cairn::git::mock::MockVcs;
//! use cairn::git::Vcs;
//!
//! let vcs = MockVcs::new("main");
//! vcs.create_and_checkout_branch("alice/stack-feat/TOP").unwrap();
//! assert_eq!(vcs.current_branch().unwrap(), "alice/stack-feat/TOP");
//! assert!(vcs.branch_exists("main").unwrap());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::core::types::Oid;

use super::interface::{CommitInfo, GitError, Vcs};

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// `rebase` stops on conflicts and leaves the repository mid-rebase.
    RebaseConflict,
    /// `fetch` fails with the given stderr.
    Fetch(String),
    /// `push_with_lease` fails with the given stderr.
    Push(String),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Checkout {
        name: String,
    },
    CreateBranch {
        name: String,
        at: Option<Oid>,
    },
    ResetHard {
        rev: String,
    },
    Fetch {
        remote: String,
    },
    Rebase {
        onto: String,
    },
    AbortRebase,
    DeleteBranch {
        name: String,
        force: bool,
    },
    DeleteRemoteBranch {
        remote: String,
        name: String,
    },
    PushWithLease {
        remote: String,
        local_rev: String,
        remote_branch: String,
    },
}

#[derive(Debug)]
struct MockVcsInner {
    /// Local branches and their tips.
    branches: BTreeMap<String, Oid>,
    /// Currently checked-out branch.
    current: String,
    /// Scripted `commits_between` result per branch.
    commits: BTreeMap<String, Vec<CommitInfo>>,
    /// Scripted revisions beyond local branches (e.g. `origin/main`).
    revs: BTreeMap<String, Oid>,
    /// Branches known to exist on the remote.
    remote_branches: BTreeSet<String>,
    /// Whether tracked files are modified.
    uncommitted: bool,
    /// Whether a rebase has stopped mid-way.
    rebase_in_progress: bool,
    /// Scripted failure.
    fail_on: Option<FailOn>,
    /// Recorded mutating operations.
    operations: Vec<MockOperation>,
    /// Pretend git common dir / hooks dir root.
    dir: PathBuf,
}

/// Mock VCS for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockVcs {
    inner: Arc<Mutex<MockVcsInner>>,
}

/// A deterministic fake commit hash for tests: `n` repeated into 40 hex chars.
pub fn fake_oid(n: u8) -> Oid {
    Oid::new(format!("{:040x}", u64::from(n))).unwrap()
}

impl MockVcs {
    /// Create a mock repository with one branch checked out at a fake tip.
    pub fn new(initial_branch: &str) -> Self {
        let mut branches = BTreeMap::new();
        branches.insert(initial_branch.to_string(), fake_oid(1));
        Self {
            inner: Arc::new(Mutex::new(MockVcsInner {
                branches,
                current: initial_branch.to_string(),
                commits: BTreeMap::new(),
                revs: BTreeMap::new(),
                remote_branches: BTreeSet::new(),
                uncommitted: false,
                rebase_in_progress: false,
                fail_on: None,
                operations: Vec::new(),
                dir: std::env::temp_dir(),
            })),
        }
    }

    // =========================================================================
    // Test scripting
    // =========================================================================

    /// Add a branch without checking it out.
    pub fn add_branch(&self, name: &str, tip: Oid) {
        self.inner
            .lock()
            .unwrap()
            .branches
            .insert(name.to_string(), tip);
    }

    /// Move a branch tip.
    pub fn set_branch_tip(&self, name: &str, tip: Oid) {
        self.inner
            .lock()
            .unwrap()
            .branches
            .insert(name.to_string(), tip);
    }

    /// Script the `commits_between` result for a branch.
    pub fn set_commits(&self, branch: &str, commits: Vec<CommitInfo>) {
        self.inner
            .lock()
            .unwrap()
            .commits
            .insert(branch.to_string(), commits);
    }

    /// Script a resolvable revision (e.g. `origin/main`).
    pub fn set_rev(&self, rev: &str, oid: Oid) {
        self.inner.lock().unwrap().revs.insert(rev.to_string(), oid);
    }

    /// Mark a branch as existing on the remote.
    pub fn add_remote_branch(&self, name: &str) {
        self.inner
            .lock()
            .unwrap()
            .remote_branches
            .insert(name.to_string());
    }

    /// Set the dirty-worktree flag.
    pub fn set_uncommitted(&self, dirty: bool) {
        self.inner.lock().unwrap().uncommitted = dirty;
    }

    /// Point the pretend git dir (and hooks dir) at a test directory.
    pub fn set_dir(&self, dir: &std::path::Path) {
        self.inner.lock().unwrap().dir = dir.to_path_buf();
    }

    /// Script a failure.
    pub fn fail_on(&self, fail: FailOn) {
        self.inner.lock().unwrap().fail_on = Some(fail);
    }

    /// Clear any scripted failure.
    pub fn clear_fail(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    // =========================================================================
    // Test inspection
    // =========================================================================

    /// All recorded mutating operations, in order.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Local branch names.
    pub fn branch_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().branches.keys().cloned().collect()
    }

    /// Branches currently on the remote.
    pub fn remote_branches(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .remote_branches
            .iter()
            .cloned()
            .collect()
    }

    fn resolve(inner: &MockVcsInner, rev: &str) -> Result<Oid, GitError> {
        if rev == "HEAD" {
            return inner
                .branches
                .get(&inner.current)
                .cloned()
                .ok_or(GitError::DetachedHead);
        }
        if let Some(oid) = inner.branches.get(rev) {
            return Ok(oid.clone());
        }
        if let Some(oid) = inner.revs.get(rev) {
            return Ok(oid.clone());
        }
        if let Ok(oid) = Oid::new(rev) {
            return Ok(oid);
        }
        Err(GitError::RevisionNotFound {
            rev: rev.to_string(),
        })
    }
}

impl Vcs for MockVcs {
    fn current_branch(&self) -> Result<String, GitError> {
        Ok(self.inner.lock().unwrap().current.clone())
    }

    fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        Ok(self.inner.lock().unwrap().branches.contains_key(name))
    }

    fn create_and_checkout_branch(&self, name: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.branches.contains_key(name) {
            return Err(GitError::BranchExists {
                name: name.to_string(),
            });
        }
        let tip = inner
            .branches
            .get(&inner.current)
            .cloned()
            .ok_or(GitError::DetachedHead)?;
        inner.branches.insert(name.to_string(), tip);
        inner.current = name.to_string();
        inner.operations.push(MockOperation::CreateBranch {
            name: name.to_string(),
            at: None,
        });
        Ok(())
    }

    fn create_and_checkout_branch_at(&self, name: &str, at: &Oid) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.branches.contains_key(name) {
            return Err(GitError::BranchExists {
                name: name.to_string(),
            });
        }
        inner.branches.insert(name.to_string(), at.clone());
        inner.current = name.to_string();
        inner.operations.push(MockOperation::CreateBranch {
            name: name.to_string(),
            at: Some(at.clone()),
        });
        Ok(())
    }

    fn checkout_branch(&self, name: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.branches.contains_key(name) {
            return Err(GitError::BranchNotFound {
                name: name.to_string(),
            });
        }
        inner.current = name.to_string();
        inner.operations.push(MockOperation::Checkout {
            name: name.to_string(),
        });
        Ok(())
    }

    fn reset_hard(&self, rev: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        let oid = Self::resolve(&inner, rev)?;
        let current = inner.current.clone();
        inner.branches.insert(current, oid);
        inner.operations.push(MockOperation::ResetHard {
            rev: rev.to_string(),
        });
        Ok(())
    }

    fn fetch(&self, remote: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Fetch {
            remote: remote.to_string(),
        });
        if let Some(FailOn::Fetch(stderr)) = &inner.fail_on {
            return Err(GitError::CommandFailed {
                command: format!("git fetch {remote}"),
                stderr: stderr.clone(),
            });
        }
        Ok(())
    }

    fn rebase(&self, onto: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Rebase {
            onto: onto.to_string(),
        });
        if matches!(inner.fail_on, Some(FailOn::RebaseConflict)) {
            inner.rebase_in_progress = true;
            return Err(GitError::RebaseConflict {
                onto: onto.to_string(),
            });
        }
        Ok(())
    }

    fn rebase_in_progress(&self) -> Result<bool, GitError> {
        Ok(self.inner.lock().unwrap().rebase_in_progress)
    }

    fn abort_rebase(&self) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.rebase_in_progress = false;
        inner.operations.push(MockOperation::AbortRebase);
        Ok(())
    }

    fn commits_between(&self, _base: &str, branch: &str) -> Result<Vec<CommitInfo>, GitError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .commits
            .get(branch)
            .cloned()
            .unwrap_or_default())
    }

    fn commit_hash(&self, rev: &str) -> Result<Oid, GitError> {
        let inner = self.inner.lock().unwrap();
        Self::resolve(&inner, rev)
    }

    fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        Ok(self.inner.lock().unwrap().uncommitted)
    }

    fn delete_branch(&self, name: &str, force: bool) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DeleteBranch {
            name: name.to_string(),
            force,
        });
        if inner.branches.remove(name).is_none() {
            return Err(GitError::BranchNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DeleteRemoteBranch {
            remote: remote.to_string(),
            name: name.to_string(),
        });
        if !inner.remote_branches.remove(name) {
            return Err(GitError::CommandFailed {
                command: format!("git push {remote} --delete {name}"),
                stderr: "remote ref does not exist".to_string(),
            });
        }
        Ok(())
    }

    fn remote_name(&self) -> Result<String, GitError> {
        Ok("origin".to_string())
    }

    fn push_with_lease(
        &self,
        remote: &str,
        local_rev: &str,
        remote_branch: &str,
    ) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::PushWithLease {
            remote: remote.to_string(),
            local_rev: local_rev.to_string(),
            remote_branch: remote_branch.to_string(),
        });
        if let Some(FailOn::Push(stderr)) = &inner.fail_on {
            return Err(GitError::CommandFailed {
                command: format!("git push --force-with-lease {remote}"),
                stderr: stderr.clone(),
            });
        }
        inner.remote_branches.insert(remote_branch.to_string());
        Ok(())
    }

    fn git_common_dir(&self) -> PathBuf {
        self.inner.lock().unwrap().dir.clone()
    }

    fn hooks_dir(&self) -> PathBuf {
        self.inner.lock().unwrap().dir.join("hooks")
    }
}
