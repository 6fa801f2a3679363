//! CLI-level integration tests: argument surface, the commit-msg hook,
//! and read-only commands against real repositories.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn cairn() -> Command {
    Command::cargo_bin("cairn").expect("binary builds")
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn git {args:?}: {e}"));
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init"]);
    git(dir.path(), &["checkout", "-b", "main"]);
    git(dir.path(), &["config", "user.name", "Test"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);
    fs::write(dir.path().join("base.txt"), "base\n").unwrap();
    git(dir.path(), &["add", "-A"]);
    git(dir.path(), &["commit", "-m", "initial commit"]);
    dir
}

#[test]
fn help_lists_core_commands() {
    cairn()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("install"));
}

#[test]
fn list_outside_a_repo_fails() {
    let dir = TempDir::new().unwrap();
    cairn()
        .args(["--cwd", dir.path().to_str().unwrap(), "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a git repository"));
}

#[test]
fn list_with_no_stacks_hints_at_create() {
    let dir = init_repo();
    cairn()
        .args(["--cwd", dir.path().to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no stacks"));
}

#[test]
fn navigation_outside_a_stack_is_a_precondition_error() {
    let dir = init_repo();
    cairn()
        .args(["--cwd", dir.path().to_str().unwrap(), "up"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not part of a stack"));
}

#[test]
fn install_writes_the_hook() {
    let dir = init_repo();
    cairn()
        .args(["--cwd", dir.path().to_str().unwrap(), "install"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed hook"));

    let hook = dir.path().join(".git").join("hooks").join("commit-msg");
    let contents = fs::read_to_string(&hook).unwrap();
    assert!(contents.contains("cairn hook commit-msg"));

    // Re-running refreshes rather than failing.
    cairn()
        .args(["--cwd", dir.path().to_str().unwrap(), "install"])
        .assert()
        .success()
        .stdout(predicate::str::contains("refreshed hook"));
}

#[test]
fn hook_injects_trailers_on_stack_branches() {
    let dir = init_repo();
    git(dir.path(), &["checkout", "-b", "alice/stack-demo/TOP"]);

    let msg = dir.path().join("COMMIT_EDITMSG");
    fs::write(&msg, "Add login\n\nSome body.\n").unwrap();

    cairn()
        .args([
            "--cwd",
            dir.path().to_str().unwrap(),
            "hook",
            "commit-msg",
            msg.to_str().unwrap(),
        ])
        .assert()
        .success();

    let rewritten = fs::read_to_string(&msg).unwrap();
    assert!(rewritten.starts_with("Add login\n\nSome body.\n"));
    assert!(rewritten.contains("\nPR-UUID: "));
    assert!(rewritten.contains("\nPR-Stack: demo\n"));
}

#[test]
fn hook_is_inert_off_stack_branches() {
    let dir = init_repo();
    let msg = dir.path().join("COMMIT_EDITMSG");
    fs::write(&msg, "Plain commit\n").unwrap();

    cairn()
        .args([
            "--cwd",
            dir.path().to_str().unwrap(),
            "hook",
            "commit-msg",
            msg.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&msg).unwrap(), "Plain commit\n");
}

#[test]
fn hook_does_not_duplicate_existing_trailers() {
    let dir = init_repo();
    git(dir.path(), &["checkout", "-b", "alice/stack-demo/TOP"]);

    let msg = dir.path().join("COMMIT_EDITMSG");
    let original = "Add login\n\nPR-UUID: 1111111111111111\nPR-Stack: demo\n";
    fs::write(&msg, original).unwrap();

    cairn()
        .args([
            "--cwd",
            dir.path().to_str().unwrap(),
            "hook",
            "commit-msg",
            msg.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&msg).unwrap(), original);
}

#[test]
fn end_to_end_hooked_commits_build_a_stack_log() {
    // Install for real, commit through git so the hook runs, and check
    // the derived stack. The store is written by hand because `create`
    // needs forge access this test environment does not have.
    let dir = init_repo();
    cairn()
        .args(["--cwd", dir.path().to_str().unwrap(), "install"])
        .assert()
        .success();

    git(dir.path(), &["checkout", "-b", "alice/stack-demo/TOP"]);
    let stack_dir = dir.path().join(".git").join("stack").join("demo");
    fs::create_dir_all(&stack_dir).unwrap();
    let base_ref = String::from_utf8(
        Command::new("git")
            .current_dir(dir.path())
            .args(["rev-parse", "main"])
            .output()
            .unwrap()
            .stdout,
    )
    .unwrap();
    fs::write(
        stack_dir.join("config.json"),
        format!(
            r#"{{
  "name": "demo",
  "branch": "alice/stack-demo/TOP",
  "base": "main",
  "owner": "acme",
  "repo_name": "api",
  "created": "2024-01-01T00:00:00Z",
  "base_ref": "{}"
}}"#,
            base_ref.trim()
        ),
    )
    .unwrap();

    // The installed hook fires only when the cairn binary is on PATH.
    let bin_dir = Path::new(env!("CARGO_BIN_EXE_cairn")).parent().unwrap();
    let path = format!(
        "{}:{}",
        bin_dir.display(),
        std::env::var("PATH").unwrap_or_default()
    );

    fs::write(dir.path().join("a.txt"), "a\n").unwrap();
    git(dir.path(), &["add", "-A"]);
    let output = Command::new("git")
        .current_dir(dir.path())
        .env("PATH", &path)
        .args(["commit", "-m", "Add a"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "commit failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    cairn()
        .args(["--cwd", dir.path().to_str().unwrap(), "log"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stack 'demo'"))
        .stdout(predicate::str::contains("Add a"))
        .stdout(predicate::str::contains("unpushed"));
}
