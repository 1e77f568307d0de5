//! In-memory stand-ins for the external resolver, the builder, the prepare
//! engine and the system keychain.

use crate::core::{ProjkitError, Status};
use crate::env_spec::parse_spec;
use crate::env_spec::platform::current_platform;
use crate::lockfile::LockSet;
use crate::prepare::{PrepareEngine, PrepareResult};
use crate::project::Project;
use crate::requirements::keychain::entry_user;
use crate::requirements::{Keychain, ProvideTarget, Requirement};
use crate::resolver::{BuildRequest, DependencyResolver, EnvironmentBuilder};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Version every package without an explicit one is pinned to.
pub const DEFAULT_FAKE_VERSION: &str = "1.0";

/// Pins each requested package to `name=version=0` on every platform.
#[derive(Debug, Default)]
pub struct FakeResolver {
    versions: Mutex<BTreeMap<String, String>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(self, package: &str, version: &str) -> Self {
        self.set_version(package, version);
        self
    }

    /// Fail any resolution that includes `package`.
    pub fn failing_on(mut self, package: &str) -> Self {
        self.failing.insert(package.to_string());
        self
    }

    /// Change the version later resolutions pin `package` to.
    pub fn set_version(&self, package: &str, version: &str) {
        if let Ok(mut versions) = self.versions.lock() {
            versions.insert(package.to_string(), version.to_string());
        }
    }

    /// Package lists of every resolution so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl DependencyResolver for FakeResolver {
    fn resolve(
        &self,
        packages: &[String],
        _channels: &[String],
        platforms: &[String],
    ) -> Result<LockSet, ProjkitError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(packages.to_vec());
        }

        let versions = self.versions.lock().map(|v| v.clone()).unwrap_or_default();
        let mut records = Vec::new();
        for package in packages {
            let name = parse_spec(package).map_or_else(|| package.clone(), |spec| spec.name);
            if self.failing.contains(&name) {
                return Err(ProjkitError::Other {
                    message: format!("nothing provides {name}"),
                });
            }
            let version = versions.get(&name).map_or(DEFAULT_FAKE_VERSION, String::as_str);
            records.push(format!("{name}={version}=0"));
        }
        records.sort();

        let by_platform = platforms.iter().map(|p| (p.clone(), records.clone())).collect();
        Ok(LockSet::new(platforms.iter().cloned(), by_platform))
    }
}

/// One call to [`RecordingBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBuild {
    pub prefix: PathBuf,
    pub env_spec: String,
    pub locked: Option<Vec<String>>,
}

/// Creates empty prefixes and remembers what it built and removed.
#[derive(Debug, Default)]
pub struct RecordingBuilder {
    builds: Mutex<Vec<RecordedBuild>>,
    removals: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builds(&self) -> Vec<RecordedBuild> {
        self.builds.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn removals(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.removals.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl EnvironmentBuilder for RecordingBuilder {
    fn build(&self, request: &BuildRequest<'_>) -> Result<Vec<String>, ProjkitError> {
        std::fs::create_dir_all(request.prefix)?;
        let installed = match request.locked {
            Some(locked) => locked.to_vec(),
            None => request.env_spec.conda_packages.clone(),
        };
        if let Ok(mut builds) = self.builds.lock() {
            builds.push(RecordedBuild {
                prefix: request.prefix.to_path_buf(),
                env_spec: request.env_spec.name.clone(),
                locked: request.locked.map(<[String]>::to_vec),
            });
        }
        Ok(installed)
    }

    fn remove_packages(&self, prefix: &Path, packages: &[String]) -> Result<(), ProjkitError> {
        if let Ok(mut removals) = self.removals.lock() {
            removals.push((prefix.to_path_buf(), packages.to_vec()));
        }
        Ok(())
    }
}

/// A prepare engine that provides nothing and fails on demand.
///
/// Every selected requirement succeeds unless its variable was passed to
/// [`FakeEngine::failing_on`]. Env specs prepared are recorded, including the
/// lock set each one was locked to at the time.
#[derive(Debug, Default)]
pub struct FakeEngine {
    failing: HashSet<String>,
    omitted: HashSet<String>,
    prepared: Mutex<Vec<(String, Option<Vec<String>>)>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the requirement published through `env_var`.
    pub fn failing_on(mut self, env_var: &str) -> Self {
        self.failing.insert(env_var.to_string());
        self
    }

    /// Leave `env_var` out of the result, as a broken engine would.
    pub fn omitting(mut self, env_var: &str) -> Self {
        self.omitted.insert(env_var.to_string());
        self
    }

    /// Env spec and current-platform lock records of every prepare so far.
    pub fn prepared(&self) -> Vec<(String, Option<Vec<String>>)> {
        self.prepared.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl PrepareEngine for FakeEngine {
    fn prepare(
        &self,
        project: &Project,
        whitelist: Option<&[ProvideTarget]>,
        env_spec_name: Option<&str>,
    ) -> PrepareResult {
        if let Some(problems) = project.problems_status(None) {
            return PrepareResult::failed(problems);
        }
        let env_spec_name = env_spec_name.unwrap_or_else(|| project.default_env_spec_name()).to_string();
        let locked = project
            .env_spec(&env_spec_name)
            .map(|spec| &spec.lock_set)
            .filter(|lock_set| lock_set.enabled())
            .map(|lock_set| lock_set.records_for(current_platform()).to_vec());
        if let Ok(mut prepared) = self.prepared.lock() {
            prepared.push((env_spec_name.clone(), locked));
        }

        let selected = |r: &Requirement| whitelist.is_none_or(|targets| targets.iter().any(|t| t.matches(r)));
        let mut statuses = Vec::new();
        let mut failure = None;
        for requirement in project.requirements().iter().filter(|r| selected(r)) {
            let env_var = requirement.env_var();
            if self.omitted.contains(env_var) {
                continue;
            }
            let status = if self.failing.contains(env_var) {
                let status = Status::failure(format!("{} failed.", requirement.title()))
                    .with_error(format!("{env_var} could not be provided"));
                failure.get_or_insert_with(|| status.clone());
                status
            } else {
                Status::success(format!("{} is available.", requirement.title()))
            };
            statuses.push((requirement.clone(), status));
        }

        PrepareResult {
            statuses,
            environ: BTreeMap::new(),
            env_spec_name: Some(env_spec_name.clone()),
            status: failure
                .unwrap_or_else(|| Status::success(format!("Project is ready with env spec {env_spec_name}."))),
        }
    }

    fn unprepare(
        &self,
        _project: &Project,
        _previous: &PrepareResult,
        _whitelist: Option<&[ProvideTarget]>,
    ) -> Status {
        Status::success("Cleaned up project requirements.")
    }
}

/// A keychain kept in memory, keyed like the system one.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Keychain for MemoryKeychain {
    fn get(&self, env_prefix: &Path, name: &str) -> anyhow::Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| anyhow::anyhow!("keychain lock poisoned"))?;
        Ok(entries.get(&entry_user(env_prefix, name)).cloned())
    }

    fn set(&self, env_prefix: &Path, name: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow::anyhow!("keychain lock poisoned"))?;
        entries.insert(entry_user(env_prefix, name), value.to_string());
        Ok(())
    }

    fn unset(&self, env_prefix: &Path, name: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow::anyhow!("keychain lock poisoned"))?;
        entries.remove(&entry_user(env_prefix, name));
        Ok(())
    }
}
