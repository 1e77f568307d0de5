//! Locking operations: `lock`, `update` and `unlock`.
//!
//! `lock` turns locking on for env specs that are not locked yet (and fixes up
//! missing platforms on the way). `update` re-resolves even when nothing
//! changed; for an unlocked env spec it installs the fresh resolution and then
//! puts the lock file back, so the env spec stays unlocked.

use super::check_env_spec;
use crate::constants::LOCK_FILE_NAME;
use crate::core::Status;
use crate::document::array::push_unique;
use crate::env_spec::platform::default_platforms_with_current;
use crate::project::Project;
use crate::requirements::{ProvideTarget, RequirementKind};
use crate::transaction::lock_sync::{describe_changes, resolve_env_spec};
use crate::transaction::{Coordinator, save_or_reload};
use anyhow::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Lock,
    Update,
}

impl Coordinator<'_> {
    /// Lock env spec `env_spec_name`, or every env spec when `None`.
    pub fn lock(&self, project: &mut Project, env_spec_name: Option<&str>) -> Result<Status> {
        self.update_and_lock(project, env_spec_name, Mode::Lock)
    }

    /// Re-resolve env spec `env_spec_name`, or every env spec when `None`.
    pub fn update(&self, project: &mut Project, env_spec_name: Option<&str>) -> Result<Status> {
        self.update_and_lock(project, env_spec_name, Mode::Update)
    }

    /// Stop locking env spec `env_spec_name`, or every env spec when `None`.
    pub fn unlock(&self, project: &mut Project, env_spec_name: Option<&str>) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if let Err(status) = check_env_spec(project, env_spec_name) {
            return Ok(status);
        }

        project.lock_file_mut().disable_locking(env_spec_name);
        let target = ProvideTarget::Kind(RequirementKind::Environment);
        let status = self.commit_requirement_if_it_works(project, &target, env_spec_name)?;
        if !status.is_success() {
            return Ok(status);
        }
        let description = match env_spec_name {
            Some(name) => format!("Dependency locking is now disabled for env spec {name}."),
            None => "Dependency locking is now disabled.".to_string(),
        };
        Ok(Status::success(description).with_logs(status.logs))
    }

    fn update_and_lock(
        &self,
        project: &mut Project,
        env_spec_name: Option<&str>,
        mode: Mode,
    ) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if let Err(status) = check_env_spec(project, env_spec_name) {
            return Ok(status);
        }

        let mut selected: Vec<String> = match env_spec_name {
            Some(name) => vec![name.to_string()],
            None => project.env_spec_names(),
        };
        if mode == Mode::Update {
            // installing an unlocked env spec reloads the lock file, so those
            // go first while nothing else is pending
            selected.sort_by_key(|name| project.env_spec(name).is_some_and(|e| e.lock_set.enabled()));
        }

        let mut logs = Vec::new();
        let mut need_save = false;
        if mode == Mode::Lock && fix_missing_platforms(project, &selected, &mut logs) {
            project.use_changes_without_saving();
            if let Some(problems) = project.problems_status(None) {
                project.load()?;
                return Ok(problems.prepend_logs(logs));
            }
            need_save = true;
        }

        let roster = project.env_spec_names();
        for name in &selected {
            let Some(env_spec) = project.env_spec(name).cloned() else {
                continue;
            };
            let old = &env_spec.lock_set;
            let hash = env_spec.logical_hash();
            if mode == Mode::Lock && old.enabled() && !old.is_stale_for(&hash) {
                debug!(env_spec = %name, "Already locked");
                logs.push(format!("Locked dependencies for env spec {name} are already up to date."));
                continue;
            }

            let resolved = match resolve_env_spec(self.resolver(), &env_spec) {
                Ok(resolved) => resolved,
                Err(status) => {
                    project.load()?;
                    return Ok(status.prepend_logs(logs));
                }
            };
            let lock_set_changed = !old.equivalent_to(&resolved);
            let hash_changed =
                old.env_spec_hash().is_some_and(|h| Some(h) != resolved.env_spec_hash());

            if lock_set_changed || mode == Mode::Lock {
                project.lock_file_mut().set_lock_set(name, &resolved, &roster);
                let status = if mode == Mode::Update && !old.enabled() {
                    let status = self.apply_lock_file_then_revert(project, name)?;
                    if status.is_success() {
                        logs.extend(status.logs.iter().cloned());
                        logs.push(format!("Updated installed dependencies for {name}."));
                    }
                    status
                } else {
                    let replacing = old.enabled() && !old.missing_from_lock_file();
                    logs.extend(describe_changes(name, old, &resolved));
                    let target = ProvideTarget::Kind(RequirementKind::Environment);
                    let status = self.try_requirement_without_commit(project, &target, Some(name))?;
                    if status.is_success() {
                        logs.extend(status.logs.iter().cloned());
                        logs.push(if replacing {
                            format!("Updated locked dependencies for env spec {name} in {LOCK_FILE_NAME}.")
                        } else {
                            format!("Added locked dependencies for env spec {name} to {LOCK_FILE_NAME}.")
                        });
                        need_save = true;
                    }
                    status
                };
                if !status.is_success() {
                    project.load()?;
                    return Ok(status.prepend_logs(logs));
                }
            } else if hash_changed {
                let Some(new_hash) = resolved.env_spec_hash() else {
                    continue;
                };
                project.lock_file_mut().set_lock_set_hash(name, new_hash);
                logs.push(format!("Updated hash for env spec {name} to {new_hash} in {LOCK_FILE_NAME}."));
                need_save = true;
            } else {
                logs.push(format!("Locked dependencies for env spec {name} are already up to date."));
            }
        }

        if need_save {
            project.use_changes_without_saving();
            save_or_reload(project)?;
            info!(env_specs = selected.len(), "Saved lock file");
        }

        let description = match mode {
            Mode::Update => "Update complete.",
            Mode::Lock => "Project dependencies are locked.",
        };
        Ok(Status::success(description).with_logs(logs))
    }
}

/// Give platforms to the selected env specs that have none.
///
/// When no env spec has any, the global list is filled in instead. Returns
/// whether the project file changed.
fn fix_missing_platforms(project: &mut Project, selected: &[String], logs: &mut Vec<String>) -> bool {
    let defaults = default_platforms_with_current();
    let without: Vec<String> = project
        .env_specs()
        .values()
        .filter(|env_spec| env_spec.platforms.is_empty())
        .map(|env_spec| env_spec.name.clone())
        .collect();
    if without.is_empty() {
        return false;
    }

    let everything_empty = without.len() == project.env_specs().len();
    let declared = project.declares_env_specs();
    let doc = project.project_file_mut();
    if everything_empty {
        let Some(array) = doc.array_mut(&["platforms"]) else {
            return false;
        };
        for platform in &defaults {
            push_unique(array, platform);
        }
        logs.push(format!("Set project platforms list to {}", defaults.join(", ")));
        return true;
    }

    let mut changed = false;
    for name in selected.iter().filter(|name| declared && without.contains(name)) {
        let Some(array) = doc.array_mut(&["env_specs", name.as_str(), "platforms"]) else {
            continue;
        };
        for platform in &defaults {
            push_unique(array, platform);
        }
        logs.push(format!("Set platforms for {name} to {}", defaults.join(", ")));
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROJECT_FILE_NAME;
    use crate::env_spec::platform::current_platform;
    use crate::prepare::RegistryPrepareEngine;
    use crate::test_utils::{FakeResolver, RecordingBuilder, TestProject};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const PROJECT: &str = "\
name = \"demo\"
platforms = [\"linux-64\", \"osx-arm64\"]

[env_specs.default]
packages = [\"numpy\"]

[env_specs.extra]
packages = [\"pandas\"]
";

    fn engine() -> RegistryPrepareEngine {
        RegistryPrepareEngine::with_environ(BTreeMap::new())
    }

    /// The project, with the current platform among its platforms.
    fn project_text() -> String {
        let current = current_platform();
        let second = if current == "linux-64" { "osx-arm64" } else { current };
        PROJECT.replace("osx-arm64", second)
    }

    #[test]
    fn test_lock_then_lock_again() {
        let project = TestProject::new(&project_text()).unwrap();
        let mut opened = project.open().unwrap();
        let resolver = FakeResolver::new().with_version("numpy", "1.26.0");
        let engine = engine();
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.lock(&mut opened, None).unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(resolver.call_count(), 2);
        let lock = project.read(LOCK_FILE_NAME);
        assert!(lock.contains("numpy=1.26.0=0"));
        assert!(lock.contains("pandas=1.0=0"));
        assert!(opened.lock_file().locking_enabled());

        let status = coordinator.lock(&mut opened, None).unwrap();
        assert!(status.is_success());
        assert_eq!(resolver.call_count(), 2);
        assert!(status.logs.iter().all(|l| l.contains("already up to date")));
        assert_eq!(project.read(LOCK_FILE_NAME), lock);
    }

    #[test]
    fn test_lock_one_env_spec_leaves_others_unlocked() {
        let project = TestProject::new(&project_text()).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.lock(&mut opened, Some("extra")).unwrap();
        assert!(status.is_success(), "{status}");
        assert!(opened.env_spec("extra").unwrap().lock_set.enabled());
        assert!(!opened.env_spec("default").unwrap().lock_set.enabled());
    }

    #[test]
    fn test_lock_fills_in_platforms() {
        let project = TestProject::new("name = \"demo\"\npackages = [\"numpy\"]\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.lock(&mut opened, None).unwrap();
        assert!(status.is_success(), "{status}");
        assert!(status.logs[0].starts_with("Set project platforms list to"));
        assert!(!opened.global_platforms().is_empty());
        assert!(project.read(PROJECT_FILE_NAME).contains("linux-64"));
    }

    #[test]
    fn test_update_reports_changes() {
        let project = TestProject::new(&project_text()).unwrap();
        let mut opened = project.open().unwrap();
        let resolver = FakeResolver::new().with_version("numpy", "1.25.0");
        let engine = engine();
        let coordinator = Coordinator::new(&resolver, &engine);
        coordinator.lock(&mut opened, Some("default")).unwrap();

        resolver.set_version("numpy", "1.26.0");
        let status = coordinator.update(&mut opened, Some("default")).unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(status.description, "Update complete.");
        assert!(status.logs.iter().any(|l| l.contains("numpy=1.25.0=0 -> numpy=1.26.0=0")));
        assert!(project.read(LOCK_FILE_NAME).contains("numpy=1.26.0=0"));

        let status = coordinator.update(&mut opened, Some("default")).unwrap();
        assert!(status.logs.iter().any(|l| l.contains("already up to date")));
    }

    #[test]
    fn test_update_unlocked_installs_without_locking() {
        let builder = Arc::new(RecordingBuilder::new());
        let project = TestProject::new(&project_text()).unwrap().with_builder(builder.clone());
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.update(&mut opened, Some("default")).unwrap();
        assert!(status.is_success(), "{status}");
        assert!(status.logs.iter().any(|l| l == "Updated installed dependencies for default."));
        let builds = builder.builds();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].locked.as_deref(), Some(&["numpy=1.0=0".to_string()][..]));
        assert!(!opened.env_spec("default").unwrap().lock_set.enabled());
        assert!(!project.join(LOCK_FILE_NAME).exists());
    }

    #[test]
    fn test_resolver_failure_changes_nothing() {
        let project = TestProject::new(&project_text()).unwrap();
        let mut opened = project.open().unwrap();
        let resolver = FakeResolver::new().failing_on("pandas");
        let engine = engine();
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.lock(&mut opened, None).unwrap();
        assert!(!status.is_success());
        assert_eq!(
            status.description,
            "Error resolving dependencies for extra: nothing provides pandas."
        );
        assert!(!project.join(LOCK_FILE_NAME).exists());
        assert!(!opened.lock_file().locking_enabled());
    }

    #[test]
    fn test_unlock() {
        let project = TestProject::new(&project_text()).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);
        coordinator.lock(&mut opened, None).unwrap();

        let status = coordinator.unlock(&mut opened, Some("extra")).unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(status.description, "Dependency locking is now disabled for env spec extra.");
        assert!(!opened.env_spec("extra").unwrap().lock_set.enabled());
        assert!(opened.env_spec("default").unwrap().lock_set.enabled());

        let status = coordinator.unlock(&mut opened, None).unwrap();
        assert!(status.is_success());
        assert!(!opened.lock_file().locking_enabled());
        assert!(!opened.env_spec("default").unwrap().lock_set.enabled());
    }
}
