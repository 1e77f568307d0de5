//! Failed operations leave both documents, on disk and in memory, as they
//! were before the operation started.

use crate::common::{single_env_project, snapshot};
use projkit_cli::constants::ENV_PREFIX_VAR;
use projkit_cli::requirements::Requirement;
use projkit_cli::test_utils::{FakeEngine, FakeResolver};
use projkit_cli::transaction::Coordinator;

#[test]
fn test_resolver_failure_during_lock() {
    let project = single_env_project(&["numpy", "broken"]);
    let resolver = FakeResolver::new().failing_on("broken");
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    let before = snapshot(&project);

    let status = coordinator.lock(&mut opened, None).unwrap();
    assert!(!status.is_success());
    assert!(status.description.contains("default"), "{status}");
    assert_eq!(snapshot(&project), before);
    assert!(!opened.env_spec("default").unwrap().lock_set.enabled());
    assert!(engine.prepared().is_empty());
}

#[test]
fn test_resolver_failure_while_adding_packages() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new().failing_on("broken");
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    coordinator.lock(&mut opened, None).unwrap();
    let before = snapshot(&project);

    let status = coordinator
        .add_packages(&mut opened, Some("default"), &["broken".to_string()], &[])
        .unwrap();
    assert!(!status.is_success());
    assert_eq!(snapshot(&project), before);
    assert_eq!(opened.env_spec("default").unwrap().conda_packages, ["numpy"]);
}

#[test]
fn test_unknown_platform_is_refused() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    let before = snapshot(&project);

    let status = coordinator
        .add_platforms(&mut opened, None, &["amiga-68k".to_string()])
        .unwrap();
    assert!(!status.is_success());
    assert!(status.errors.iter().any(|e| e.contains("amiga-68k")), "{status}");
    assert_eq!(snapshot(&project), before);
    assert!(opened.problems().is_empty());
    assert_eq!(resolver.call_count(), 0);
}

#[test]
fn test_failed_download_is_not_added() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new().failing_on("DATA");
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    let before = snapshot(&project);

    let status = coordinator
        .add_download(&mut opened, "DATA", "http://example.com/data.csv", None, None)
        .unwrap();
    assert!(!status.is_success());
    assert!(status.errors.iter().any(|e| e == "DATA could not be provided"), "{status}");
    assert_eq!(snapshot(&project), before);
    assert!(
        !opened
            .requirements()
            .iter()
            .any(|r| matches!(r, Requirement::Download { env_var, .. } if env_var == "DATA"))
    );
}

#[test]
fn test_last_env_spec_cannot_be_removed() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new();
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    coordinator.lock(&mut opened, None).unwrap();
    let before = snapshot(&project);

    let status = coordinator.remove_env_spec(&mut opened, "default").unwrap();
    assert!(!status.is_success());
    assert_eq!(
        status.description,
        "At least one environment spec is required; 'default' is the only one left."
    );
    assert_eq!(snapshot(&project), before);
    assert!(opened.env_spec("default").is_some());
}

#[test]
fn test_engine_omitting_a_status_is_an_error() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new().omitting("REDIS_URL");
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    let before = snapshot(&project);

    let result = coordinator.add_service(&mut opened, "redis", None);
    assert!(result.is_err());
    assert_eq!(snapshot(&project), before);
}

#[test]
fn test_engine_omitting_a_status_is_an_error_even_when_prepare_fails() {
    let project = single_env_project(&["numpy"]);
    let resolver = FakeResolver::new();
    let engine = FakeEngine::new().failing_on(ENV_PREFIX_VAR).omitting("REDIS_URL");
    let coordinator = Coordinator::new(&resolver, &engine);
    let mut opened = project.open().unwrap();
    let before = snapshot(&project);

    let result = coordinator.add_service(&mut opened, "redis", None);
    assert!(result.is_err());
    assert_eq!(snapshot(&project), before);
}
