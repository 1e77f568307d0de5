//! The `projkit` binary, run against temp directories.

use crate::common::projkit_cmd;
use predicates::prelude::*;
use projkit_cli::constants::{LOCK_FILE_NAME, PROJECT_FILE_NAME, PROJECT_IGNORE_FILE_NAME};
use tempfile::TempDir;

fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    projkit_cmd(dir.path()).args(["init", "--name", "demo"]).assert().success();
    dir
}

#[test]
fn test_init_creates_project_files() {
    let dir = TempDir::new().unwrap();
    projkit_cmd(dir.path())
        .args(["init", "--name", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created projkit project"));

    let content = std::fs::read_to_string(dir.path().join(PROJECT_FILE_NAME)).unwrap();
    assert!(content.contains("name = \"demo\""), "{content}");
    assert!(dir.path().join(PROJECT_IGNORE_FILE_NAME).is_file());

    projkit_cmd(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Project already exists"));
}

#[test]
fn test_init_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("analysis");
    projkit_cmd(dir.path())
        .arg("init")
        .arg("--directory")
        .arg(&nested)
        .assert()
        .success();
    assert!(nested.join(PROJECT_FILE_NAME).is_file());
}

#[test]
fn test_commands_need_a_project() {
    let dir = TempDir::new().unwrap();
    projkit_cmd(dir.path())
        .arg("list-variables")
        .assert()
        .failure()
        .stderr(predicate::str::contains("projkit init"));
    projkit_cmd(dir.path())
        .args(["add-variable", "FOO"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("projkit init"));
    assert!(!dir.path().join(PROJECT_FILE_NAME).exists());
}

#[test]
fn test_add_and_list_variables() {
    let dir = initialized();
    projkit_cmd(dir.path())
        .arg("list-variables")
        .assert()
        .success()
        .stdout(predicate::str::contains("No variables found for project."));

    projkit_cmd(dir.path())
        .args(["add-variable", "--default", "8080", "PORT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Variables added to the project file."));
    projkit_cmd(dir.path())
        .arg("list-variables")
        .assert()
        .success()
        .stdout(predicate::str::contains("Variables").and(predicate::str::contains("PORT")));
}

#[test]
fn test_set_unknown_variable_fails() {
    let dir = initialized();
    let before = std::fs::read_to_string(dir.path().join(PROJECT_FILE_NAME)).unwrap();
    projkit_cmd(dir.path())
        .args(["set-variable", "NOPE=1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Variable NOPE does not exist in the project."));
    assert_eq!(std::fs::read_to_string(dir.path().join(PROJECT_FILE_NAME)).unwrap(), before);
}

#[test]
fn test_add_and_list_commands() {
    let dir = initialized();
    projkit_cmd(dir.path())
        .args(["add-command", "hello", "echo hello"])
        .assert()
        .success();
    projkit_cmd(dir.path())
        .arg("list-commands")
        .assert()
        .success()
        .stdout(predicate::str::contains("hello").and(predicate::str::contains("echo hello")));

    let content = std::fs::read_to_string(dir.path().join(PROJECT_FILE_NAME)).unwrap();
    assert!(content.contains("unix = \"echo hello\""), "{content}");
}

#[test]
fn test_lock_without_resolver_fails() {
    let dir = initialized();
    projkit_cmd(dir.path())
        .arg("lock")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No dependency resolver is configured"));
    let lock = std::fs::read_to_string(dir.path().join(LOCK_FILE_NAME)).unwrap_or_default();
    assert!(!lock.contains("locking_enabled = true"), "{lock}");
}

#[test]
fn test_removing_only_env_spec_fails() {
    let dir = initialized();
    let before = std::fs::read_to_string(dir.path().join(PROJECT_FILE_NAME)).unwrap();
    projkit_cmd(dir.path())
        .args(["remove-env-spec", "--name", "default"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("At least one environment spec is required"));
    assert_eq!(std::fs::read_to_string(dir.path().join(PROJECT_FILE_NAME)).unwrap(), before);
}

#[test]
fn test_quiet_and_verbose_conflict() {
    let dir = initialized();
    projkit_cmd(dir.path())
        .args(["--quiet", "--verbose", "list-env-specs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
