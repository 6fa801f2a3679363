//! store
//!
//! JSON-backed persistent state under `<git-common-dir>/stack/`.
//!
//! # Design
//!
//! Every write is whole-file: serialize, write to a sibling temp file,
//! then rename over the target. The store is not multi-process safe, but
//! a crash at any point leaves the previous valid file in place.
//!
//! Missing files return defaults (`prs.json` → empty map, `config.json` →
//! not-installed record, stack config → `None`). Malformed JSON is a hard
//! error; the store never silently regenerates corrupted state.

pub mod paths;

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::core::model::{PrData, RebaseState, RepositoryConfig, Stack};
use paths::StorePaths;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("store io error at '{path}': {source}")]
    Io {
        /// Path involved in the failed operation
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed JSON on disk.
    #[error("failed to parse '{path}': {message}")]
    Parse {
        /// Path of the malformed file
        path: PathBuf,
        /// Parser error message
        message: String,
    },

    /// Failed to serialize a value for writing.
    #[error("failed to serialize '{path}': {message}")]
    Serialize {
        /// Path being written
        path: PathBuf,
        /// Serializer error message
        message: String,
    },
}

/// The persistent store for one repository.
#[derive(Debug, Clone)]
pub struct Store {
    paths: StorePaths,
}

impl Store {
    /// Open the store rooted at `<git_common_dir>/stack/`.
    ///
    /// Nothing is created on open; directories appear on first write.
    pub fn open(git_common_dir: &Path) -> Self {
        Self {
            paths: StorePaths::new(git_common_dir),
        }
    }

    /// Path routing for this store.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    // =========================================================================
    // Repository config
    // =========================================================================

    /// Load the repository install record, defaulting to not-installed.
    pub fn load_repo_config(&self) -> Result<RepositoryConfig, StoreError> {
        Ok(self
            .read_json(&self.paths.repo_config())?
            .unwrap_or_default())
    }

    /// Save the repository install record.
    pub fn save_repo_config(&self, config: &RepositoryConfig) -> Result<(), StoreError> {
        self.write_json(&self.paths.repo_config(), config)
    }

    // =========================================================================
    // Stacks
    // =========================================================================

    /// Whether a stack's config file exists.
    pub fn stack_exists(&self, name: &str) -> bool {
        self.paths.stack_config(name).is_file()
    }

    /// Load a stack's metadata. Returns `Ok(None)` when the stack does not
    /// exist.
    pub fn load_stack(&self, name: &str) -> Result<Option<Stack>, StoreError> {
        self.read_json(&self.paths.stack_config(name))
    }

    /// Save a stack's metadata.
    pub fn save_stack(&self, stack: &Stack) -> Result<(), StoreError> {
        self.write_json(&self.paths.stack_config(&stack.name), stack)
    }

    /// List stack names, skipping the archive directory.
    ///
    /// A directory counts as a stack iff it contains a `config.json`.
    pub fn list_stacks(&self) -> Result<Vec<String>, StoreError> {
        let root = self.paths.root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(root).map_err(|source| StoreError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: root.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if path.join("config.json").is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Archive a stack's directory under `.archived/<name>-<timestamp>`.
    ///
    /// Returns the archive path. The stack directory is moved, not copied,
    /// so the stack ceases to exist in the store.
    pub fn archive_stack(&self, name: &str) -> Result<PathBuf, StoreError> {
        let source = self.paths.stack_dir(name);
        let target = self.paths.archive_target(name, &Utc::now());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::rename(&source, &target).map_err(|e| StoreError::Io {
            path: source.clone(),
            source: e,
        })?;
        Ok(target)
    }

    // =========================================================================
    // PR records
    // =========================================================================

    /// Load a stack's PR records, defaulting to an empty map.
    pub fn load_prs(&self, name: &str) -> Result<PrData, StoreError> {
        Ok(self.read_json(&self.paths.prs(name))?.unwrap_or_default())
    }

    /// Save a stack's PR records.
    pub fn save_prs(&self, name: &str, prs: &PrData) -> Result<(), StoreError> {
        self.write_json(&self.paths.prs(name), prs)
    }

    // =========================================================================
    // Rebase recovery
    // =========================================================================

    /// Load a pending recovery record, if one exists.
    pub fn load_rebase_state(&self, name: &str) -> Result<Option<RebaseState>, StoreError> {
        self.read_json(&self.paths.rebase_state(name))
    }

    /// Persist a recovery record.
    pub fn save_rebase_state(&self, name: &str, state: &RebaseState) -> Result<(), StoreError> {
        self.write_json(&self.paths.rebase_state(name), state)
    }

    /// Remove the recovery record. Missing files are not an error.
    pub fn clear_rebase_state(&self, name: &str) -> Result<(), StoreError> {
        let path = self.paths.rebase_state(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    // =========================================================================
    // JSON plumbing
    // =========================================================================

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Write a value as indented JSON: temp file in the same directory,
    /// then rename over the target for atomic visibility.
    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp).map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
            file.write_all(json.as_bytes())
                .and_then(|()| file.write_all(b"\n"))
                .map_err(|source| StoreError::Io {
                    path: tmp.clone(),
                    source,
                })?;
        }
        fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{PrRecord, PrState};
    use crate::core::types::{ChangeId, Oid};
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path());
        (dir, store)
    }

    fn sample_stack(name: &str) -> Stack {
        Stack {
            name: name.to_string(),
            branch: format!("alice/stack-{name}/TOP"),
            base: "main".to_string(),
            owner: "acme".to_string(),
            repo_name: "api".to_string(),
            created: Utc::now(),
            last_synced: None,
            sync_hash: None,
            base_ref: Oid::new("1111111111111111111111111111111111111111").unwrap(),
            merged_changes: vec![],
        }
    }

    #[test]
    fn repo_config_defaults_when_missing() {
        let (_dir, store) = store();
        let config = store.load_repo_config().unwrap();
        assert!(!config.is_installed());
    }

    #[test]
    fn repo_config_roundtrip() {
        let (_dir, store) = store();
        let config = RepositoryConfig {
            hooks_installed: true,
            hooks_version: 1,
            git_configured: true,
            installed_at: Some(Utc::now()),
            last_updated_at: Some(Utc::now()),
        };
        store.save_repo_config(&config).unwrap();
        let loaded = store.load_repo_config().unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn missing_stack_is_none() {
        let (_dir, store) = store();
        assert!(store.load_stack("nope").unwrap().is_none());
        assert!(!store.stack_exists("nope"));
    }

    #[test]
    fn stack_roundtrip() {
        let (_dir, store) = store();
        let stack = sample_stack("feat");
        store.save_stack(&stack).unwrap();
        assert!(store.stack_exists("feat"));
        let loaded = store.load_stack("feat").unwrap().unwrap();
        assert_eq!(stack, loaded);
    }

    #[test]
    fn prs_default_to_empty() {
        let (_dir, store) = store();
        let prs = store.load_prs("feat").unwrap();
        assert_eq!(prs.version, 1);
        assert!(prs.prs.is_empty());
    }

    #[test]
    fn prs_roundtrip() {
        let (_dir, store) = store();
        let mut data = PrData::default();
        data.prs.insert(
            ChangeId::new("1111111111111111").unwrap(),
            PrRecord {
                pr_number: 101,
                url: "https://github.com/acme/api/pull/101".into(),
                branch: "alice/stack-feat/1111111111111111".into(),
                commit_hash: Oid::new("2222222222222222222222222222222222222222").unwrap(),
                created_at: Utc::now(),
                last_pushed: Some(Utc::now()),
                state: PrState::Open,
                title: "Add login".into(),
                body: String::new(),
                base: "main".into(),
                viz_comment_id: Some(900),
                local_draft_status: false,
                remote_draft_status: false,
            },
        );
        store.save_prs("feat", &data).unwrap();
        let loaded = store.load_prs("feat").unwrap();
        assert_eq!(data, loaded);
    }

    #[test]
    fn malformed_json_is_hard_error() {
        let (dir, store) = store();
        let path = dir.path().join("stack").join("feat");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("config.json"), "{ not json").unwrap();
        let err = store.load_stack("feat").unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn rebase_state_roundtrip_and_clear() {
        let (_dir, store) = store();
        assert!(store.load_rebase_state("feat").unwrap().is_none());
        let state = RebaseState {
            original_stack_head: Oid::new("3333333333333333333333333333333333333333").unwrap(),
            new_commit_hash: None,
            old_commit_hash: None,
            stack_branch: "alice/stack-feat/TOP".into(),
            timestamp: Utc::now(),
        };
        store.save_rebase_state("feat", &state).unwrap();
        assert_eq!(store.load_rebase_state("feat").unwrap(), Some(state));
        store.clear_rebase_state("feat").unwrap();
        assert!(store.load_rebase_state("feat").unwrap().is_none());
        // Clearing twice is fine
        store.clear_rebase_state("feat").unwrap();
    }

    #[test]
    fn list_stacks_skips_archive_and_stray_dirs() {
        let (dir, store) = store();
        store.save_stack(&sample_stack("alpha")).unwrap();
        store.save_stack(&sample_stack("beta")).unwrap();
        // A directory without config.json is not a stack
        fs::create_dir_all(dir.path().join("stack").join("stray")).unwrap();
        // Archived stacks are invisible
        store.archive_stack("beta").unwrap();

        assert_eq!(store.list_stacks().unwrap(), vec!["alpha".to_string()]);
    }

    #[test]
    fn archive_moves_directory() {
        let (_dir, store) = store();
        store.save_stack(&sample_stack("feat")).unwrap();
        let target = store.archive_stack("feat").unwrap();
        assert!(!store.stack_exists("feat"));
        assert!(target.join("config.json").is_file());
    }

    #[test]
    fn writes_leave_no_temp_files() {
        let (dir, store) = store();
        store.save_stack(&sample_stack("feat")).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path().join("stack").join("feat"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["config.json".to_string()]);
    }
}
