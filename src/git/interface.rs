//! git::interface
//!
//! The [`Vcs`] trait and its production implementation.
//!
//! # Design
//!
//! Reads go through libgit2 (`git2`): resolving refs, walking commit
//! ranges, inspecting worktree status. Worktree mutations (checkout,
//! rebase, reset, fetch, push) shell out to the `git` binary so that
//! hooks, credential helpers, and user configuration behave exactly as
//! they do on the command line.
//!
//! # Error Handling
//!
//! Git failures are normalized into typed [`GitError`] variants. The one
//! the engine cares most about is [`GitError::RebaseConflict`], which is
//! distinguishable from other subprocess failures so the refresh engine
//! can stop and leave the repository mid-rebase for the user.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::core::types::{Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// HEAD is not on a branch.
    #[error("HEAD is detached; checkout a branch first")]
    DetachedHead,

    /// A named branch does not exist.
    #[error("branch not found: {name}")]
    BranchNotFound {
        /// The missing branch
        name: String,
    },

    /// Attempted to create a branch that already exists.
    #[error("branch already exists: {name}")]
    BranchExists {
        /// The conflicting branch
        name: String,
    },

    /// A revision could not be resolved.
    #[error("revision not found: {rev}")]
    RevisionNotFound {
        /// The unresolvable revision
        rev: String,
    },

    /// A rebase stopped on conflicts.
    ///
    /// The repository is left mid-rebase; callers must surface this to
    /// the user rather than retrying.
    #[error("rebase onto '{onto}' stopped on conflicts")]
    RebaseConflict {
        /// The rebase target
        onto: String,
    },

    /// A git subprocess exited non-zero.
    #[error("'{command}' failed: {stderr}")]
    CommandFailed {
        /// The command line that failed
        command: String,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// Internal libgit2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::Internal {
            message: err.to_string(),
        }
    }
}

/// One commit in a stack range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit hash
    pub hash: Oid,
    /// Full commit message, trailers included
    pub message: String,
}

/// The narrow VCS contract the engine is written against.
///
/// Implementations: [`GitRepo`] (production), [`crate::git::mock::MockVcs`]
/// (tests). All methods are synchronous; the repository is mutated by at
/// most one operation at a time.
pub trait Vcs {
    /// Name of the currently checked-out branch.
    fn current_branch(&self) -> Result<String, GitError>;

    /// Whether a local branch exists.
    fn branch_exists(&self, name: &str) -> Result<bool, GitError>;

    /// Create a branch at HEAD and check it out.
    fn create_and_checkout_branch(&self, name: &str) -> Result<(), GitError>;

    /// Create a branch at a specific commit and check it out.
    fn create_and_checkout_branch_at(&self, name: &str, at: &Oid) -> Result<(), GitError>;

    /// Check out an existing branch.
    fn checkout_branch(&self, name: &str) -> Result<(), GitError>;

    /// Hard-reset the current branch to a revision.
    fn reset_hard(&self, rev: &str) -> Result<(), GitError>;

    /// Fetch from a remote.
    fn fetch(&self, remote: &str) -> Result<(), GitError>;

    /// Rebase the current branch onto a revision.
    ///
    /// A conflict surfaces as [`GitError::RebaseConflict`] and leaves the
    /// repository mid-rebase.
    fn rebase(&self, onto: &str) -> Result<(), GitError>;

    /// Whether a rebase is currently in progress.
    fn rebase_in_progress(&self) -> Result<bool, GitError>;

    /// Abort an in-progress rebase.
    fn abort_rebase(&self) -> Result<(), GitError>;

    /// Commits in `base..branch`, oldest first.
    fn commits_between(&self, base: &str, branch: &str) -> Result<Vec<CommitInfo>, GitError>;

    /// Resolve a revision to a commit hash.
    fn commit_hash(&self, rev: &str) -> Result<Oid, GitError>;

    /// Whether tracked files have staged or unstaged modifications.
    fn has_uncommitted_changes(&self) -> Result<bool, GitError>;

    /// Delete a local branch.
    fn delete_branch(&self, name: &str, force: bool) -> Result<(), GitError>;

    /// Delete a branch on a remote.
    fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<(), GitError>;

    /// The remote to fetch from and push to (`origin` when present).
    fn remote_name(&self) -> Result<String, GitError>;

    /// Push a revision to a remote branch with `--force-with-lease`.
    fn push_with_lease(
        &self,
        remote: &str,
        local_rev: &str,
        remote_branch: &str,
    ) -> Result<(), GitError>;

    /// The shared git directory (refs, objects, config), stable across
    /// linked worktrees. The persistent store is rooted here.
    fn git_common_dir(&self) -> PathBuf;

    /// Directory where hook scripts are installed.
    fn hooks_dir(&self) -> PathBuf;
}

/// Production VCS adapter over a real repository.
pub struct GitRepo {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("workdir", &self.workdir)
            .finish()
    }
}

impl GitRepo {
    /// Discover the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository contains the path
    /// - [`GitError::BareRepo`] for bare repositories
    pub fn discover(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        let workdir = repo
            .workdir()
            .ok_or(GitError::BareRepo)?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    /// URL of a remote, if configured.
    pub fn remote_url(&self, remote: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(remote) {
            Ok(r) => Ok(r.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Run a git subprocess in the worktree, capturing output.
    fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .output()
            .map_err(|e| GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn resolve_commit(&self, rev: &str) -> Result<git2::Oid, GitError> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|_| GitError::RevisionNotFound {
                rev: rev.to_string(),
            })?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| GitError::RevisionNotFound {
                rev: rev.to_string(),
            })?;
        Ok(commit.id())
    }
}

impl Vcs for GitRepo {
    fn current_branch(&self) -> Result<String, GitError> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Err(GitError::DetachedHead);
        }
        head.shorthand()
            .map(String::from)
            .ok_or(GitError::DetachedHead)
    }

    fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        match self.repo.find_branch(name, git2::BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn create_and_checkout_branch(&self, name: &str) -> Result<(), GitError> {
        if self.branch_exists(name)? {
            return Err(GitError::BranchExists {
                name: name.to_string(),
            });
        }
        self.run_git(&["checkout", "-b", name]).map(|_| ())
    }

    fn create_and_checkout_branch_at(&self, name: &str, at: &Oid) -> Result<(), GitError> {
        if self.branch_exists(name)? {
            return Err(GitError::BranchExists {
                name: name.to_string(),
            });
        }
        self.run_git(&["checkout", "-b", name, at.as_str()])
            .map(|_| ())
    }

    fn checkout_branch(&self, name: &str) -> Result<(), GitError> {
        if !self.branch_exists(name)? {
            return Err(GitError::BranchNotFound {
                name: name.to_string(),
            });
        }
        self.run_git(&["checkout", name]).map(|_| ())
    }

    fn reset_hard(&self, rev: &str) -> Result<(), GitError> {
        self.run_git(&["reset", "--hard", rev]).map(|_| ())
    }

    fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.run_git(&["fetch", "--prune", remote]).map(|_| ())
    }

    fn rebase(&self, onto: &str) -> Result<(), GitError> {
        match self.run_git(&["rebase", onto]) {
            Ok(_) => Ok(()),
            Err(err) => {
                // A stopped rebase leaves the repository in a rebase state;
                // anything else is an ordinary subprocess failure.
                if self.rebase_in_progress()? {
                    Err(GitError::RebaseConflict {
                        onto: onto.to_string(),
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    fn rebase_in_progress(&self) -> Result<bool, GitError> {
        Ok(matches!(
            self.repo.state(),
            git2::RepositoryState::Rebase
                | git2::RepositoryState::RebaseInteractive
                | git2::RepositoryState::RebaseMerge
        ))
    }

    fn abort_rebase(&self) -> Result<(), GitError> {
        self.run_git(&["rebase", "--abort"]).map(|_| ())
    }

    fn commits_between(&self, base: &str, branch: &str) -> Result<Vec<CommitInfo>, GitError> {
        let branch_oid = self.resolve_commit(branch)?;
        let base_oid = self.resolve_commit(base)?;

        let mut walk = self.repo.revwalk()?;
        walk.push(branch_oid)?;
        walk.hide(base_oid)?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;

        let mut commits = Vec::new();
        for id in walk {
            let id = id?;
            let commit = self.repo.find_commit(id)?;
            commits.push(CommitInfo {
                hash: Oid::new(id.to_string())?,
                message: commit.message().unwrap_or_default().to_string(),
            });
        }
        Ok(commits)
    }

    fn commit_hash(&self, rev: &str) -> Result<Oid, GitError> {
        let oid = self.resolve_commit(rev)?;
        Ok(Oid::new(oid.to_string())?)
    }

    fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    fn delete_branch(&self, name: &str, force: bool) -> Result<(), GitError> {
        let flag = if force { "-D" } else { "-d" };
        self.run_git(&["branch", flag, name]).map(|_| ())
    }

    fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<(), GitError> {
        self.run_git(&["push", remote, "--delete", name]).map(|_| ())
    }

    fn remote_name(&self) -> Result<String, GitError> {
        let remotes = self.repo.remotes()?;
        let names: Vec<&str> = remotes.iter().flatten().collect();
        if names.iter().any(|n| *n == "origin") {
            return Ok("origin".to_string());
        }
        names
            .first()
            .map(|n| n.to_string())
            .ok_or_else(|| GitError::Internal {
                message: "repository has no remotes".to_string(),
            })
    }

    fn push_with_lease(
        &self,
        remote: &str,
        local_rev: &str,
        remote_branch: &str,
    ) -> Result<(), GitError> {
        let refspec = format!("{local_rev}:refs/heads/{remote_branch}");
        self.run_git(&["push", "--force-with-lease", remote, &refspec])
            .map(|_| ())
    }

    fn git_common_dir(&self) -> PathBuf {
        self.repo.commondir().to_path_buf()
    }

    fn hooks_dir(&self) -> PathBuf {
        self.repo.path().join("hooks")
    }
}
