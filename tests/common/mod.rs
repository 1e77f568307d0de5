//! Common test utilities for projkit integration tests

// Not every helper is used by every test file
#![allow(dead_code)]

use assert_cmd::Command;
use projkit_cli::constants::{LOCK_FILE_NAME, PROJECT_FILE_NAME};
use projkit_cli::env_spec::platform::current_platform;
use projkit_cli::test_utils::TestProject;
use std::path::Path;

/// A `projkit` command run in `dir`, with an empty global config so the
/// user's own configuration never leaks in.
pub fn projkit_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("projkit").unwrap();
    cmd.current_dir(dir)
        .env("PROJKIT_CONFIG", dir.join("no-such-config.toml"))
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Project file and lock file text, to compare before and after an operation.
pub fn snapshot(project: &TestProject) -> (String, String) {
    (project.read(PROJECT_FILE_NAME), project.read(LOCK_FILE_NAME))
}

/// A project with env spec `default` holding `packages`, for the current
/// platform only.
pub fn single_env_project(packages: &[&str]) -> TestProject {
    let packages: Vec<String> = packages.iter().map(|p| format!("\"{p}\"")).collect();
    TestProject::new(&format!(
        "name = \"demo\"\nplatforms = [\"{}\"]\n\n[env_specs.default]\npackages = [{}]\n",
        current_platform(),
        packages.join(", ")
    ))
    .unwrap()
}
