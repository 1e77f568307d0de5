//! Locking behavior end to end: lock, update, staleness and hash-driven
//! resolution.

use crate::common::{single_env_project, snapshot};
use projkit_cli::constants::{LOCK_FILE_NAME, PROJECT_FILE_NAME};
use projkit_cli::env_spec::platform::current_platform;
use projkit_cli::test_utils::{FakeEngine, FakeResolver, TestProject};
use projkit_cli::transaction::Coordinator;

#[test]
fn test_numpy_then_scipy() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new().with_version("numpy", "1.26.0");
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();

    let status = coordinator.lock(&mut opened, None).unwrap();
    assert!(status.is_success(), "{status}");
    assert_eq!(resolver.call_count(), 1);
    assert!(
        status.logs.iter().any(|l| l == "Added locked dependencies for env spec default to projkit.lock."),
        "{:?}",
        status.logs
    );

    let default = opened.env_spec("default").unwrap();
    assert!(default.lock_set.enabled());
    assert_eq!(default.lock_set.env_spec_hash(), Some(default.logical_hash().as_str()));
    let lock = project.read(LOCK_FILE_NAME);
    assert!(lock.contains("numpy=1.26.0=0"));
    assert!(lock.contains(&default.logical_hash()));

    // Nothing changed: no resolution, nothing rewritten
    let before = snapshot(&project);
    let status = coordinator.lock(&mut opened, None).unwrap();
    assert!(status.is_success());
    assert_eq!(resolver.call_count(), 1);
    assert_eq!(status.logs, ["Locked dependencies for env spec default are already up to date."]);
    assert_eq!(snapshot(&project), before);

    // scipy added by hand, outside of projkit
    let text = project.read(PROJECT_FILE_NAME).replace("[\"numpy\"]", "[\"numpy\", \"scipy\"]");
    project.write(PROJECT_FILE_NAME, &text).unwrap();
    let mut opened = project.open().unwrap();
    let default = opened.env_spec("default").unwrap();
    assert!(default.lock_set.is_stale_for(&default.logical_hash()));

    let status = coordinator.update(&mut opened, None).unwrap();
    assert!(status.is_success(), "{status}");
    assert_eq!(resolver.call_count(), 2);
    assert!(status.logs.iter().any(|l| l == "Changes to locked dependencies for default:"));
    assert!(status.logs.iter().any(|l| l.trim() == "+ scipy=1.0=0"), "{:?}", status.logs);

    let default = opened.env_spec("default").unwrap();
    assert!(!default.lock_set.is_stale_for(&default.logical_hash()));
    assert!(project.read(LOCK_FILE_NAME).contains("scipy=1.0=0"));
}

#[test]
fn test_adding_packages_to_locked_env_spec_resolves_once() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    coordinator.lock(&mut opened, None).unwrap();

    let status = coordinator
        .add_packages(&mut opened, Some("default"), &["pandas".to_string()], &[])
        .unwrap();
    assert!(status.is_success(), "{status}");
    assert_eq!(resolver.call_count(), 2);
    assert!(project.read(LOCK_FILE_NAME).contains("pandas=1.0=0"));

    // the environment was prepared against the new lock set
    let prepared = engine.prepared();
    let (env_spec, locked) = prepared.last().unwrap();
    assert_eq!(env_spec, "default");
    assert_eq!(locked.as_deref(), Some(&["numpy=1.0=0".to_string(), "pandas=1.0=0".to_string()][..]));
}

#[test]
fn test_adding_existing_package_is_a_no_op() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    coordinator.lock(&mut opened, None).unwrap();
    let before = snapshot(&project);

    let status = coordinator
        .add_packages(&mut opened, Some("default"), &["numpy".to_string()], &[])
        .unwrap();
    assert!(status.is_success(), "{status}");
    assert_eq!(resolver.call_count(), 1);
    assert_eq!(snapshot(&project), before);
}

#[test]
fn test_formatting_changes_do_not_trigger_resolution() {
    let platform = current_platform();
    let project = TestProject::new(&format!(
        "name = \"demo\"\nplatforms = [\"{platform}\"]\n\n[env_specs.default]\npackages = [\"numpy\", \"scipy\"]\nchannels = [\"conda-forge\"]\n"
    ))
    .unwrap();
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    coordinator.lock(&mut opened, None).unwrap();
    let hash = opened.env_spec("default").unwrap().logical_hash();

    // comment, key order and package order change; the inputs do not
    project
        .write(
            PROJECT_FILE_NAME,
            &format!(
                "# analysis project\nplatforms = [\"{platform}\"]\nname = \"demo\"\n\n[env_specs.default]\nchannels = [\"conda-forge\"] # main channel\npackages = [\n  \"scipy\",\n  \"numpy\",\n]\n"
            ),
        )
        .unwrap();
    let mut opened = project.open().unwrap();
    assert_eq!(opened.env_spec("default").unwrap().logical_hash(), hash);

    let status = coordinator.add_service(&mut opened, "redis", None).unwrap();
    assert!(status.is_success(), "{status}");
    assert_eq!(resolver.call_count(), 1);
    assert!(project.read(PROJECT_FILE_NAME).starts_with("# analysis project\n"));
}

#[test]
fn test_stale_hash_is_overwritten_even_when_packages_match() {
    let platform = current_platform();
    let project = TestProject::new(&format!(
        "name = \"demo\"\nplatforms = [\"{platform}\"]\n\n[env_specs.default]\npackages = [\"numpy\"]\n"
    ))
    .unwrap()
    .with_lock(&format!(
        "locking_enabled = true\n\n[env_specs.default]\nlocked = true\nenv_spec_hash = \"0000\"\nplatforms = [\"{platform}\"]\n\n[env_specs.default.packages]\nall = [\"numpy=1.0=0\"]\n"
    ))
    .unwrap();
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    let hash = opened.env_spec("default").unwrap().logical_hash();

    // an unrelated edit still reconciles the stale lock set
    let status = coordinator.add_service(&mut opened, "redis", None).unwrap();
    assert!(status.is_success(), "{status}");
    assert_eq!(resolver.call_count(), 1);

    let lock = project.read(LOCK_FILE_NAME);
    assert!(!lock.contains("\"0000\""));
    assert!(lock.contains(&hash));
    assert!(lock.contains("numpy=1.0=0"));
}

#[test]
fn test_update_with_identical_resolution_only_refreshes_hash() {
    let platform = current_platform();
    let project = TestProject::new(&format!(
        "name = \"demo\"\nplatforms = [\"{platform}\"]\n\n[env_specs.default]\npackages = [\"numpy\"]\n"
    ))
    .unwrap()
    .with_lock(&format!(
        "locking_enabled = true\n\n[env_specs.default]\nlocked = true\nenv_spec_hash = \"0000\"\nplatforms = [\"{platform}\"]\n\n[env_specs.default.packages]\nall = [\"numpy=1.0=0\"]\n"
    ))
    .unwrap();
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    let hash = opened.env_spec("default").unwrap().logical_hash();

    let status = coordinator.update(&mut opened, None).unwrap();
    assert!(status.is_success(), "{status}");
    assert_eq!(
        status.logs,
        [format!("Updated hash for env spec default to {hash} in projkit.lock.")]
    );
    assert!(project.read(LOCK_FILE_NAME).contains(&hash));
}
