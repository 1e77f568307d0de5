//! The environment provider.
//!
//! Builds the selected env spec into `envs/<name>` and publishes the prefix in
//! `PROJKIT_ENV_PREFIX`. A marker file inside the prefix records what was
//! built, so an environment whose inputs did not change is reused without
//! calling the builder again.

use super::wrong_kind;
use crate::constants::ENV_MARKER_FILE_NAME;
use crate::core::Status;
use crate::env_spec::EnvSpec;
use crate::env_spec::platform::current_platform;
use crate::requirements::{ProvideContext, Provider, Requirement};
use crate::resolver::{BuildRequest, EnvironmentBuilder};
use crate::utils::fs::{remove_dir_all, safe_write};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// What the marker file remembers about a built environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EnvMarker {
    env_spec: String,
    logical_hash: String,
    platform: String,
    #[serde(default)]
    locked: Option<Vec<String>>,
}

impl EnvMarker {
    fn read(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        safe_write(path, &json)
    }
}

/// Provides the environment requirement.
#[derive(Default)]
pub struct EnvironmentProvider {
    builder: Option<Arc<dyn EnvironmentBuilder>>,
}

impl EnvironmentProvider {
    pub fn new(builder: Option<Arc<dyn EnvironmentBuilder>>) -> Self {
        Self {
            builder,
        }
    }

    pub fn builder(&self) -> Option<&dyn EnvironmentBuilder> {
        self.builder.as_deref()
    }
}

/// Records to install for `env_spec` on the current platform.
///
/// `Ok(None)` means the env spec is unlocked and the builder resolves itself.
fn locked_records<'a>(env_spec: &'a EnvSpec, platform: &str) -> Result<Option<&'a [String]>, Status> {
    let lock_set = &env_spec.lock_set;
    if !lock_set.enabled() {
        return Ok(None);
    }
    if lock_set.missing_from_lock_file() {
        return Err(Status::failure(format!(
            "Env spec '{}' is locked but has no entry in the lock file; run `projkit lock`.",
            env_spec.name
        )));
    }
    if lock_set.is_stale_for(&env_spec.logical_hash()) {
        return Err(Status::failure(format!(
            "Env spec '{}' has changed since it was locked; run `projkit update`.",
            env_spec.name
        )));
    }
    if !lock_set.supports_platform(platform) {
        return Err(Status::failure(format!(
            "Env spec '{}' is not locked for the current platform {platform} (locked for: {}).",
            env_spec.name,
            lock_set.platforms().join(", ")
        )));
    }
    Ok(Some(lock_set.records_for(platform)))
}

/// Delete an environment prefix.
pub fn remove_env_path(path: &Path) -> Status {
    if !path.exists() {
        return Status::success(format!("Nothing to clean up for environment {}.", path.display()));
    }
    match remove_dir_all(path) {
        Ok(()) => Status::success(format!("Deleted environment files in {}.", path.display())),
        Err(e) => Status::failure(format!(
            "Failed to remove environment files in {}: {e:#}.",
            path.display()
        )),
    }
}

impl Provider for EnvironmentProvider {
    fn provide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status {
        let Requirement::Environment {
            env_var,
        } = requirement
        else {
            return wrong_kind("environment", requirement);
        };
        let Some(env_spec) = context.env_spec else {
            return Status::failure("No env spec was selected for the environment.");
        };

        let platform = current_platform();
        let locked = match locked_records(env_spec, platform) {
            Ok(locked) => locked,
            Err(status) => return status,
        };

        let prefix = env_spec.path(context.project_dir);
        let prefix_value = prefix.display().to_string();
        let marker_path = prefix.join(ENV_MARKER_FILE_NAME);
        let marker = EnvMarker {
            env_spec: env_spec.name.clone(),
            logical_hash: env_spec.logical_hash(),
            platform: platform.to_string(),
            locked: locked.map(<[String]>::to_vec),
        };

        if EnvMarker::read(&marker_path).as_ref() == Some(&marker) {
            debug!(env_spec = %env_spec.name, "Environment is up to date");
            context.environ.insert(env_var.clone(), prefix_value);
            return Status::success(format!("Using environment at {}.", prefix.display()));
        }

        let Some(builder) = self.builder() else {
            context.environ.insert(env_var.clone(), prefix_value);
            return Status::success(format!("Environment for env spec '{}' is ready.", env_spec.name))
                .with_logs([format!(
                    "No environment builder is configured; skipped creating {}.",
                    prefix.display()
                )]);
        };

        info!(env_spec = %env_spec.name, prefix = %prefix.display(), "Building environment");
        let request = BuildRequest {
            prefix: &prefix,
            env_spec,
            locked,
            platform,
        };
        let logs = match builder.build(&request) {
            Ok(logs) => logs,
            Err(e) => {
                return Status::failure(format!(
                    "Failed to create environment for env spec '{}'.",
                    env_spec.name
                ))
                .with_error(e.to_string());
            }
        };

        if let Err(e) = marker.write(&marker_path) {
            return Status::failure(format!(
                "Failed to record the environment state in {}.",
                marker_path.display()
            ))
            .with_logs(logs)
            .with_error(format!("{e:#}"));
        }

        context.environ.insert(env_var.clone(), prefix_value);
        Status::success(format!("Environment for env spec '{}' is ready.", env_spec.name))
            .with_logs(logs)
    }

    fn unprovide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status {
        if !matches!(requirement, Requirement::Environment { .. }) {
            return wrong_kind("environment", requirement);
        }
        match context.env_spec {
            Some(env_spec) => remove_env_path(&env_spec.path(context.project_dir)),
            None => Status::success("No environment to clean up."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ENV_PREFIX_VAR;
    use crate::core::ProjkitError;
    use crate::lockfile::LockSet;
    use crate::project::LocalState;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingBuilder {
        builds: Mutex<Vec<Option<Vec<String>>>>,
    }

    impl EnvironmentBuilder for CountingBuilder {
        fn build(&self, request: &BuildRequest<'_>) -> Result<Vec<String>, ProjkitError> {
            std::fs::create_dir_all(request.prefix)?;
            self.builds.lock().unwrap().push(request.locked.map(<[String]>::to_vec));
            Ok(vec!["installed".to_string()])
        }

        fn remove_packages(&self, _prefix: &Path, _packages: &[String]) -> Result<(), ProjkitError> {
            Ok(())
        }
    }

    fn requirement() -> Requirement {
        Requirement::Environment {
            env_var: ENV_PREFIX_VAR.to_string(),
        }
    }

    fn provide(provider: &EnvironmentProvider, dir: &TempDir, env_spec: &EnvSpec) -> (Status, BTreeMap<String, String>) {
        let mut environ = BTreeMap::new();
        let mut local_state = LocalState::open(dir.path()).unwrap();
        let mut context = ProvideContext {
            project_dir: dir.path(),
            env_spec: Some(env_spec),
            environ: &mut environ,
            local_state: &mut local_state,
        };
        let status = provider.provide(&requirement(), &mut context);
        (status, environ)
    }

    fn locked_spec(platform: &str) -> EnvSpec {
        let mut env_spec = EnvSpec::new(
            "default",
            vec!["numpy".to_string()],
            vec![],
            vec![platform.to_string()],
        );
        let packages = BTreeMap::from([(platform.to_string(), vec!["numpy=1.26.0=0".to_string()])]);
        env_spec.lock_set =
            LockSet::new([platform], packages).with_env_spec_hash(env_spec.logical_hash());
        env_spec
    }

    #[test]
    fn test_builds_once_then_reuses() {
        let dir = TempDir::new().unwrap();
        let builder = Arc::new(CountingBuilder::default());
        let provider = EnvironmentProvider::new(Some(builder.clone()));
        let env_spec = locked_spec(current_platform());

        let (status, environ) = provide(&provider, &dir, &env_spec);
        assert!(status.is_success(), "{status}");
        assert_eq!(status.logs, vec!["installed"]);
        assert!(environ[ENV_PREFIX_VAR].ends_with("default"));

        let (status, _) = provide(&provider, &dir, &env_spec);
        assert!(status.is_success());
        assert!(status.description.starts_with("Using environment"));

        let builds = builder.builds.lock().unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].as_deref(), Some(&["numpy=1.26.0=0".to_string()][..]));
    }

    #[test]
    fn test_refuses_lock_set_without_current_platform() {
        let dir = TempDir::new().unwrap();
        let other = if current_platform() == "win-arm64" { "linux-64" } else { "win-arm64" };
        let provider = EnvironmentProvider::new(Some(Arc::new(CountingBuilder::default())));
        let (status, environ) = provide(&provider, &dir, &locked_spec(other));
        assert!(!status.is_success());
        assert!(status.description.contains("not locked for the current platform"));
        assert!(environ.is_empty());
    }

    #[test]
    fn test_refuses_stale_lock_set() {
        let dir = TempDir::new().unwrap();
        let mut env_spec = locked_spec(current_platform());
        env_spec.conda_packages.push("pandas".to_string());
        let (status, _) = provide(&EnvironmentProvider::default(), &dir, &env_spec);
        assert!(!status.is_success());
        assert!(status.description.contains("projkit update"));
    }

    #[test]
    fn test_without_builder_skips() {
        let dir = TempDir::new().unwrap();
        let env_spec = EnvSpec::new("default", vec![], vec![], vec![]);
        let (status, environ) = provide(&EnvironmentProvider::default(), &dir, &env_spec);
        assert!(status.is_success());
        assert!(status.logs[0].contains("skipped"));
        assert!(environ.contains_key(ENV_PREFIX_VAR));
    }

    #[test]
    fn test_remove_env_path() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("envs").join("default");
        std::fs::create_dir_all(prefix.join("bin")).unwrap();
        assert!(remove_env_path(&prefix).is_success());
        assert!(!prefix.exists());
        assert!(remove_env_path(&prefix).is_success());
    }
}
