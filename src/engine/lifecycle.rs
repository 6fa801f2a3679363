//! engine::lifecycle
//!
//! Stack lifecycle operations: install, create, switch, delete,
//! cleanup-candidate scan, and restack.
//!
//! # Install
//!
//! `install` writes the repository install record and drops a commit-msg
//! hook that re-invokes the binary to inject the stack trailers. The
//! engine itself never rewrites commits; the hook runs before the commit
//! object exists.
//!
//! # Delete
//!
//! Deleting a stack archives its store directory under
//! `.archived/<name>-<timestamp>` and removes every derived branch.
//! Local deletion failures are warnings; remote deletion failures are
//! silenced entirely (the remote may already have pruned them).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::core::branch;
use crate::core::model::{PrData, Stack, HOOKS_VERSION};
use crate::core::trailer;
use crate::core::types::{ChangeId, Oid, StackName};
use crate::forge::Forge;
use crate::git::Vcs;
use crate::store::{Store, StoreError};

use super::context::{build_for_stack, StackContext};
use super::{recovery, EngineError, InvariantKind, NotFoundKind, PreconditionKind};

/// The commit-msg hook script installed into `.git/hooks`.
const COMMIT_MSG_HOOK: &str = "#!/bin/sh\n\
# cairn commit-msg hook: injects stack trailers into new commits.\n\
exec cairn hook commit-msg \"$1\"\n";

/// Result of `install`.
#[derive(Debug)]
pub struct InstallOutcome {
    /// Where the commit-msg hook was written
    pub hook_path: PathBuf,
    /// Whether the repository was already installed
    pub already_installed: bool,
}

/// Result of `delete_stack`.
#[derive(Debug)]
pub struct DeleteOutcome {
    /// Where the stack's store directory was archived
    pub archived_to: PathBuf,
    /// Branch-cleanup failures
    pub warnings: Vec<String>,
}

/// A stack the cleanup scan considers finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupCandidate {
    /// Stack name
    pub name: String,
    /// Why it is a candidate
    pub reason: String,
}

/// Result of `restack`.
#[derive(Debug)]
pub struct RestackOutcome {
    /// The base commit the stack now sits on
    pub base_ref: Oid,
}

/// Fail unless the repository has been installed.
pub fn require_installed(store: &Store) -> Result<(), EngineError> {
    if store.load_repo_config()?.is_installed() {
        Ok(())
    } else {
        Err(EngineError::Precondition(PreconditionKind::NotInstalled))
    }
}

/// Install the commit-msg hook and write the repository install record.
///
/// Re-running is fine: the hook is refreshed and the record's
/// `last_updated_at` advances. A pre-existing hook that was not written
/// by cairn is a precondition error, not something to overwrite.
pub fn install(vcs: &dyn Vcs, store: &Store) -> Result<InstallOutcome, EngineError> {
    let mut config = store.load_repo_config()?;
    let already_installed = config.is_installed();

    let hooks_dir = vcs.hooks_dir();
    let hook_path = hooks_dir.join("commit-msg");
    if hook_path.exists() {
        let contents =
            fs::read_to_string(&hook_path).map_err(|e| io_error(&hook_path, e))?;
        if !contents.contains("cairn hook commit-msg") {
            return Err(EngineError::Precondition(PreconditionKind::HookConflict {
                path: hook_path.display().to_string(),
            }));
        }
    }
    fs::create_dir_all(&hooks_dir).map_err(|e| io_error(&hooks_dir, e))?;
    fs::write(&hook_path, COMMIT_MSG_HOOK).map_err(|e| io_error(&hook_path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&hook_path, fs::Permissions::from_mode(0o755))
            .map_err(|e| io_error(&hook_path, e))?;
    }

    let now = Utc::now();
    config.hooks_installed = true;
    config.hooks_version = HOOKS_VERSION;
    config.git_configured = true;
    config.installed_at = config.installed_at.or(Some(now));
    config.last_updated_at = Some(now);
    store.save_repo_config(&config)?;

    Ok(InstallOutcome {
        hook_path,
        already_installed,
    })
}

/// Create a stack: its TOP branch at the base's tip, plus store files.
pub async fn create_stack(
    vcs: &dyn Vcs,
    store: &Store,
    forge: &dyn Forge,
    name: &str,
    base: &str,
) -> Result<Stack, EngineError> {
    let name = StackName::new(name)?;
    require_installed(store)?;
    if vcs.has_uncommitted_changes()? {
        return Err(EngineError::Precondition(PreconditionKind::DirtyWorkingTree));
    }
    if store.stack_exists(name.as_str()) {
        return Err(EngineError::Precondition(PreconditionKind::StackExists {
            name: name.to_string(),
        }));
    }

    let base_tip = vcs.commit_hash(base)?;
    let username = forge.username().await?;
    let identity = forge.repo_info().await?;

    let top = branch::stack_branch(&username, name.as_str());
    vcs.create_and_checkout_branch_at(&top, &base_tip)?;

    let stack = Stack {
        name: name.to_string(),
        branch: top,
        base: base.to_string(),
        owner: identity.owner,
        repo_name: identity.name,
        created: Utc::now(),
        last_synced: None,
        sync_hash: None,
        base_ref: base_tip,
        merged_changes: vec![],
    };
    store.save_stack(&stack)?;
    store.save_prs(name.as_str(), &PrData::default())?;
    Ok(stack)
}

/// Check out another stack's TOP branch.
pub fn switch_stack(vcs: &dyn Vcs, store: &Store, name: &str) -> Result<String, EngineError> {
    let stack = store
        .load_stack(name)?
        .ok_or_else(|| EngineError::NotFound(NotFoundKind::Stack {
            name: name.to_string(),
        }))?;
    vcs.checkout_branch(&stack.branch)?;
    Ok(stack.branch)
}

/// Delete a stack: archive its store directory and remove its branches.
pub fn delete_stack(
    vcs: &dyn Vcs,
    store: &Store,
    name: &str,
) -> Result<DeleteOutcome, EngineError> {
    let stack = store
        .load_stack(name)?
        .ok_or_else(|| EngineError::NotFound(NotFoundKind::Stack {
            name: name.to_string(),
        }))?;
    let prs = store.load_prs(name)?;
    let user = stack
        .user()
        .ok_or_else(|| EngineError::Invariant(InvariantKind::MalformedBranch {
            branch: stack.branch.clone(),
        }))?
        .to_string();

    // Step off the stack before deleting its branches.
    let current = vcs.current_branch()?;
    if branch::extract_stack_name(&current) == Some(name) {
        vcs.checkout_branch(&stack.base)?;
    }

    // Every change id ever associated with the stack may have a branch.
    let mut uuids: BTreeSet<ChangeId> = prs.prs.keys().cloned().collect();
    uuids.extend(stack.merged_uuids());
    if let Ok(commits) = vcs.commits_between(&stack.base, &stack.branch) {
        for commit in commits {
            if let Some(uuid) = trailer::parse_message(&commit.message).pr_uuid() {
                uuids.insert(uuid);
            }
        }
    }

    let remote = vcs.remote_name().ok();
    let mut warnings = Vec::new();
    let mut cleanup = |branch_name: &str| {
        if matches!(vcs.branch_exists(branch_name), Ok(true)) {
            if let Err(e) = vcs.delete_branch(branch_name, true) {
                warnings.push(format!("could not delete branch {branch_name}: {e}"));
            }
        }
        if let Some(remote) = &remote {
            let _ = vcs.delete_remote_branch(remote, branch_name);
        }
    };
    for uuid in &uuids {
        cleanup(&branch::uuid_branch(&user, name, uuid));
    }
    cleanup(&stack.branch);
    drop(cleanup);

    let archived_to = store.archive_stack(name)?;
    Ok(DeleteOutcome {
        archived_to,
        warnings,
    })
}

/// Scan for stacks that are finished and could be deleted.
///
/// A stack qualifies when every change it ever had is merged, or when
/// its TOP branch no longer exists.
pub fn cleanup_candidates(
    vcs: &dyn Vcs,
    store: &Store,
) -> Result<Vec<CleanupCandidate>, EngineError> {
    let mut candidates = Vec::new();
    for name in store.list_stacks()? {
        let Some(stack) = store.load_stack(&name)? else {
            continue;
        };
        if !matches!(vcs.branch_exists(&stack.branch), Ok(true)) {
            candidates.push(CleanupCandidate {
                name,
                reason: "its TOP branch no longer exists".to_string(),
            });
            continue;
        }
        let ctx = build_for_stack(vcs, store, &name, &stack.branch)?;
        let finished = !ctx.all_changes.is_empty()
            && ctx.active_changes.is_empty()
            && ctx.stale_merged.is_empty();
        if finished {
            candidates.push(CleanupCandidate {
                name,
                reason: "all of its changes are merged".to_string(),
            });
        }
    }
    Ok(candidates)
}

/// Rebase the TOP branch onto the freshly-fetched base and record the
/// new base commit.
pub fn restack(
    vcs: &dyn Vcs,
    store: &Store,
    ctx: &StackContext,
) -> Result<RestackOutcome, EngineError> {
    if !ctx.on_top_branch() {
        return Err(EngineError::Precondition(PreconditionKind::NotOnTopBranch {
            branch: ctx.current_branch.clone(),
        }));
    }
    if vcs.has_uncommitted_changes()? {
        return Err(EngineError::Precondition(PreconditionKind::DirtyWorkingTree));
    }

    let mut stack = ctx.stack.clone();
    let remote = vcs.remote_name()?;
    vcs.fetch(&remote)?;
    let remote_base = format!("{remote}/{}", stack.base);
    let Ok(base_tip) = vcs.commit_hash(&remote_base) else {
        return Err(EngineError::Precondition(PreconditionKind::MissingBase {
            base: stack.base.clone(),
        }));
    };

    recovery::begin(vcs, store, &stack, None, None)?;
    vcs.rebase(&remote_base)?;
    recovery::finish(store, &stack.name)?;

    stack.base_ref = base_tip.clone();
    store.save_stack(&stack)?;
    Ok(RestackOutcome { base_ref: base_tip })
}

fn io_error(path: &Path, source: std::io::Error) -> EngineError {
    EngineError::Store(StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
