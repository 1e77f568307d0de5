//! Env spec operations: creating and removing env specs, editing their
//! packages and platforms, exporting them.

use super::{check_env_spec, unknown_env_spec};
use crate::core::Status;
use crate::document::ConfigDocument;
use crate::document::array::{contains_str, filter_in_place, map_in_place, push_unique};
use crate::env_spec::parse_spec;
use crate::env_spec::platform::default_platforms_with_current;
use crate::project::Project;
use crate::providers::environment::remove_env_path;
use crate::requirements::{ProvideTarget, RequirementKind};
use crate::transaction::{Coordinator, save_or_reload};
use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use toml_edit::{Array, Value};
use tracing::{debug, warn};

/// Path of the table holding `name`'s inputs; the root for the global ones.
fn section_path(name: Option<&str>) -> Vec<&str> {
    match name {
        Some(name) => vec!["env_specs", name],
        None => Vec::new(),
    }
}

fn field_path<'a>(name: Option<&'a str>, field: &'a str) -> Vec<&'a str> {
    let mut path = section_path(name);
    path.push(field);
    path
}

/// The array at `path`, only if it already exists.
fn existing_array_mut<'d>(doc: &'d mut ConfigDocument, path: &[&str]) -> Option<&'d mut Array> {
    if doc.get_array(path).is_some() {
        doc.array_mut(path)
    } else {
        None
    }
}

fn not_a_list(path: &[&str]) -> Status {
    Status::failure(format!("{} is not a list.", path.join(".")))
}

fn package_name(value: &Value) -> Option<String> {
    value.as_str().and_then(parse_spec).map(|spec| spec.name)
}

/// Add `packages` to `array`: exact duplicates are skipped, a spec for a
/// package already present replaces the old spec in place, the rest are
/// appended.
fn merge_package_specs(array: &mut Array, packages: &[String]) {
    let present: HashSet<String> = array.iter().filter_map(package_name).collect();
    let mut replacements: Vec<(String, &str)> = Vec::new();
    let mut additions: Vec<&str> = Vec::new();
    for spec in packages {
        if contains_str(array, spec) {
            continue;
        }
        let Some(parsed) = parse_spec(spec) else {
            continue;
        };
        if present.contains(&parsed.name) {
            replacements.push((parsed.name, spec));
        } else if !additions.contains(&spec.as_str()) {
            additions.push(spec);
        }
    }

    map_in_place(array, |value| {
        let name = package_name(value)?;
        replacements.iter().find(|(n, _)| *n == name).map(|(_, spec)| Value::from(*spec))
    });
    for spec in additions {
        array.push(spec);
    }
}

/// Whether the project file entry `value` is one of the `removing` packages,
/// given either as a bare name or as the exact spec.
fn is_removed(value: &Value, removing: &[String]) -> bool {
    let Some(spec) = value.as_str() else {
        return false;
    };
    let name = parse_spec(spec).map(|s| s.name);
    removing.iter().any(|r| r == spec || name.as_deref() == Some(r.as_str()))
}

impl Coordinator<'_> {
    /// Create env spec `name` with the given packages and channels.
    ///
    /// Adding an env spec that exists merges into it.
    pub fn add_env_spec(
        &self,
        project: &mut Project,
        name: &str,
        packages: &[String],
        channels: &[String],
    ) -> Result<Status> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Status::failure("Environment spec name must not be empty."));
        }
        self.update_env_spec(project, Some(name), packages, channels, true)
    }

    /// Add packages and channels to env spec `env_spec_name`, or to the
    /// global lists every env spec inherits when `None`.
    pub fn add_packages(
        &self,
        project: &mut Project,
        env_spec_name: Option<&str>,
        packages: &[String],
        channels: &[String],
    ) -> Result<Status> {
        self.update_env_spec(project, env_spec_name, packages, channels, false)
    }

    fn update_env_spec(
        &self,
        project: &mut Project,
        name: Option<&str>,
        packages: &[String],
        channels: &[String],
        create: bool,
    ) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if !create && let Err(status) = check_env_spec(project, name) {
            return Ok(status);
        }

        let bad: Vec<&str> =
            packages.iter().map(String::as_str).filter(|spec| parse_spec(spec).is_none()).collect();
        if !bad.is_empty() {
            return Ok(Status::failure("Could not add packages.")
                .with_error(format!("Bad package specifications: {}.", bad.join(", "))));
        }

        let target = ProvideTarget::Kind(RequirementKind::Environment);
        self.with_staged_edit(project, target, name, |project| {
            let needs_platforms = name.is_some_and(|n| project.env_spec(n).is_none())
                && project.global_platforms().is_empty();
            let doc = project.project_file_mut();

            if needs_platforms {
                let path = field_path(name, "platforms");
                let array = doc.array_mut(&path).ok_or_else(|| not_a_list(&path))?;
                for platform in default_platforms_with_current() {
                    push_unique(array, &platform);
                }
            }

            let path = field_path(name, "packages");
            let array = doc.array_mut(&path).ok_or_else(|| not_a_list(&path))?;
            merge_package_specs(array, packages);

            if !channels.is_empty() {
                let path = field_path(name, "channels");
                let array = doc.array_mut(&path).ok_or_else(|| not_a_list(&path))?;
                for channel in channels {
                    push_unique(array, channel);
                }
            }
            Ok(())
        })
    }

    /// Delete env spec `name` and its environment directory.
    ///
    /// The last env spec of a project can't be removed.
    pub fn remove_env_spec(&self, project: &mut Project, name: &str) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        let Some(env_spec) = project.env_spec(name) else {
            return Ok(unknown_env_spec(project, name));
        };
        if project.env_specs().len() == 1 {
            return Ok(Status::failure(format!(
                "At least one environment spec is required; '{name}' is the only one left."
            )));
        }

        let removed = remove_env_path(&env_spec.path(project.directory()));
        if !removed.is_success() {
            return Ok(removed);
        }

        let staged = self.stage_edit(project, |project| {
            project.project_file_mut().unset_value(&["env_specs", name]);
            Ok(())
        })?;
        if !staged.is_success() {
            return Ok(staged);
        }
        save_or_reload(project)?;

        let mut logs = vec![removed.description];
        logs.extend(staged.logs);
        Ok(Status::success(format!("Removed environment spec {name}.")).with_logs(logs))
    }

    /// Remove packages from env spec `env_spec_name`, or from every env spec
    /// and the global list when `None`.
    ///
    /// Packages are named by package name or by the exact spec. A package
    /// removed from the global list for one env spec stays in the others.
    /// Existing environments are updated on a best-effort basis first.
    pub fn remove_packages(
        &self,
        project: &mut Project,
        env_spec_name: Option<&str>,
        packages: &[String],
    ) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if let Err(status) = check_env_spec(project, env_spec_name) {
            return Ok(status);
        }
        if packages.is_empty() {
            return Ok(Status::failure("No packages given to remove."));
        }

        let all_names = project.env_spec_names();
        let (affected, unaffected): (Vec<String>, Vec<String>) = match env_spec_name {
            Some(name) => all_names.into_iter().partition(|n| n == name),
            None => (all_names, Vec::new()),
        };

        let registry = Arc::clone(project.registry());
        if let Some(builder) = registry.environment_builder() {
            for name in &affected {
                let Some(env_spec) = project.env_spec(name) else {
                    continue;
                };
                let prefix = env_spec.path(project.directory());
                if !prefix.is_dir() {
                    continue;
                }
                if let Err(e) = builder.remove_packages(&prefix, packages) {
                    warn!(env_spec = %name, error = %e, "Failed to remove packages from environment");
                }
            }
        }

        let target = ProvideTarget::Kind(RequirementKind::Environment);
        self.with_staged_edit(project, target, env_spec_name, |project| {
            let declared = project.declares_env_specs();
            let doc = project.project_file_mut();

            let removed_from_global: Vec<String> = doc
                .get_array(&["packages"])
                .map(|array| {
                    array
                        .iter()
                        .filter(|v| is_removed(v, packages))
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            if let Some(array) = existing_array_mut(doc, &["packages"]) {
                filter_in_place(array, |v| !is_removed(v, packages));
            }

            if declared {
                for name in &affected {
                    if let Some(array) = existing_array_mut(doc, &["env_specs", name, "packages"]) {
                        let count = filter_in_place(array, |v| !is_removed(v, packages));
                        debug!(env_spec = %name, removed = count, "Removed packages");
                    }
                }
                for name in &unaffected {
                    if removed_from_global.is_empty() {
                        break;
                    }
                    let path = ["env_specs", name.as_str(), "packages"];
                    let array = doc.array_mut(&path).ok_or_else(|| not_a_list(&path))?;
                    for spec in &removed_from_global {
                        push_unique(array, spec);
                    }
                }
            }
            Ok(())
        })
    }

    /// Add target platforms to env spec `env_spec_name`, or to the global list.
    pub fn add_platforms(
        &self,
        project: &mut Project,
        env_spec_name: Option<&str>,
        platforms: &[String],
    ) -> Result<Status> {
        self.modify_platforms(project, env_spec_name, platforms, &[])
    }

    /// Remove target platforms from env spec `env_spec_name`, or from the
    /// global list.
    pub fn remove_platforms(
        &self,
        project: &mut Project,
        env_spec_name: Option<&str>,
        platforms: &[String],
    ) -> Result<Status> {
        self.modify_platforms(project, env_spec_name, &[], platforms)
    }

    fn modify_platforms(
        &self,
        project: &mut Project,
        name: Option<&str>,
        additions: &[String],
        removals: &[String],
    ) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if let Err(status) = check_env_spec(project, name) {
            return Ok(status);
        }

        // unknown platform names surface as problems once the edit is promoted
        let target = ProvideTarget::Kind(RequirementKind::Environment);
        self.with_staged_edit(project, target, name, |project| {
            let path = field_path(name, "platforms");
            let doc = project.project_file_mut();
            let array = doc.array_mut(&path).ok_or_else(|| not_a_list(&path))?;
            for platform in additions {
                push_unique(array, platform);
            }
            filter_in_place(array, |v| !v.as_str().is_some_and(|p| removals.iter().any(|r| r == p)));
            Ok(())
        })
    }
}

/// Write env spec `env_spec_name` (the default one when `None`) as a conda
/// `environment.yml` file.
pub fn export_env_spec(project: &Project, env_spec_name: Option<&str>, filename: &Path) -> Status {
    if let Some(problems) = project.problems_status(None) {
        return problems;
    }
    let name = env_spec_name.unwrap_or_else(|| project.default_env_spec_name());
    let Some(env_spec) = project.env_spec(name) else {
        return unknown_env_spec(project, name);
    };
    match env_spec.save_environment_yml(filename) {
        Ok(()) => Status::success(format!(
            "Exported environment spec {name} to {}.",
            filename.display()
        )),
        Err(e) => Status::failure(format!("Failed to save {}: {e:#}.", filename.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROJECT_FILE_NAME;
    use crate::prepare::RegistryPrepareEngine;
    use crate::test_utils::{FakeResolver, RecordingBuilder, TestProject};
    use std::collections::BTreeMap;

    const TWO_SPECS: &str = "\
name = \"demo\"
platforms = [\"linux-64\"]
packages = [\"python\"]

[env_specs.default]
packages = [\"numpy\"]

[env_specs.extra]
packages = [\"pandas\"]
";

    fn engine() -> RegistryPrepareEngine {
        RegistryPrepareEngine::with_environ(BTreeMap::new())
    }

    #[test]
    fn test_merge_package_specs_replaces_by_name() {
        let mut array = Array::new();
        array.push("numpy");
        array.push("scipy");
        merge_package_specs(
            &mut array,
            &["numpy=1.26".to_string(), "scipy".to_string(), "pandas".to_string()],
        );
        let specs: Vec<&str> = array.iter().filter_map(Value::as_str).collect();
        assert_eq!(specs, ["numpy=1.26", "scipy", "pandas"]);
    }

    #[test]
    fn test_add_packages_to_env_spec() {
        let project = TestProject::new(TWO_SPECS).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator
            .add_packages(&mut opened, Some("extra"), &["requests>=2".to_string()], &[])
            .unwrap();
        assert!(status.is_success(), "{status}");
        let env_spec = opened.env_spec("extra").unwrap();
        assert_eq!(env_spec.conda_packages, ["python", "pandas", "requests>=2"]);
        assert!(project.read(PROJECT_FILE_NAME).contains("requests>=2"));
        // not locked, so nothing was resolved
        assert_eq!(resolver.call_count(), 0);
    }

    #[test]
    fn test_bad_package_spec_is_refused() {
        let project = TestProject::new(TWO_SPECS).unwrap();
        let before = project.read(PROJECT_FILE_NAME);
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator
            .add_packages(&mut opened, None, &["numpy<<<".to_string(), "ok".to_string()], &[])
            .unwrap();
        assert!(!status.is_success());
        assert_eq!(status.description, "Could not add packages.");
        assert_eq!(status.errors, ["Bad package specifications: numpy<<<."]);
        assert_eq!(project.read(PROJECT_FILE_NAME), before);
    }

    #[test]
    fn test_add_env_spec_without_global_platforms() {
        let project = TestProject::new("name = \"demo\"\n\n[env_specs.default]\nplatforms = [\"linux-64\"]\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator
            .add_env_spec(&mut opened, " py3 ", &["python=3".to_string()], &["conda-forge".to_string()])
            .unwrap();
        assert!(status.is_success(), "{status}");
        let env_spec = opened.env_spec("py3").unwrap();
        assert_eq!(env_spec.channels, ["conda-forge"]);
        assert!(env_spec.platforms.iter().any(|p| p == "linux-64"));
    }

    #[test]
    fn test_remove_env_spec() {
        let project = TestProject::new(TWO_SPECS).unwrap();
        std::fs::create_dir_all(project.join("envs/extra")).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.remove_env_spec(&mut opened, "extra").unwrap();
        assert!(status.is_success(), "{status}");
        assert!(!project.join("envs/extra").exists());
        assert!(opened.env_spec("extra").is_none());
        assert!(!project.read(PROJECT_FILE_NAME).contains("[env_specs.extra]"));

        let status = coordinator.remove_env_spec(&mut opened, "default").unwrap();
        assert!(!status.is_success());
        assert!(status.description.contains("only one left"));

        let status = coordinator.remove_env_spec(&mut opened, "defualt").unwrap();
        assert_eq!(status.description, "Environment spec defualt doesn't exist.");
        assert_eq!(status.errors, ["Did you mean: default?"]);
    }

    #[test]
    fn test_remove_global_package_from_one_env_spec() {
        let builder = Arc::new(RecordingBuilder::new());
        let project = TestProject::new(TWO_SPECS).unwrap().with_builder(builder.clone());
        std::fs::create_dir_all(project.join("envs/default")).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status =
            coordinator.remove_packages(&mut opened, Some("default"), &["python".to_string()]).unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(opened.env_spec("default").unwrap().conda_packages, ["numpy"]);
        assert_eq!(opened.env_spec("extra").unwrap().conda_packages, ["pandas", "python"]);
        assert_eq!(builder.removals().len(), 1);
    }

    #[test]
    fn test_platform_edits() {
        let project = TestProject::new(TWO_SPECS).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status =
            coordinator.add_platforms(&mut opened, None, &["osx-arm64".to_string()]).unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(opened.global_platforms(), ["linux-64", "osx-arm64"]);

        let status =
            coordinator.remove_platforms(&mut opened, None, &["linux-64".to_string()]).unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(opened.global_platforms(), ["osx-arm64"]);

        let before = project.read(PROJECT_FILE_NAME);
        let status =
            coordinator.add_platforms(&mut opened, None, &["amiga-68k".to_string()]).unwrap();
        assert!(!status.is_success());
        assert_eq!(project.read(PROJECT_FILE_NAME), before);
        assert_eq!(opened.global_platforms(), ["osx-arm64"]);
    }

    #[test]
    fn test_export_env_spec() {
        let project = TestProject::new(TWO_SPECS).unwrap();
        let opened = project.open().unwrap();
        let target = project.join("environment.yml");

        let status = export_env_spec(&opened, Some("extra"), &target);
        assert!(status.is_success(), "{status}");
        let yaml = project.read("environment.yml");
        assert!(yaml.contains("name: extra"));
        assert!(yaml.contains("pandas"));
    }
}
