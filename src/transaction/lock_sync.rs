//! Bringing the lock document in line with edited env specs.

use crate::constants::LOCK_FILE_NAME;
use crate::core::Status;
use crate::env_spec::EnvSpec;
use crate::lockfile::LockSet;
use crate::project::Project;
use crate::resolver::DependencyResolver;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Env spec state captured before an edit.
#[derive(Debug, Clone, Default)]
pub struct LockSnapshot {
    hashes: BTreeMap<String, String>,
}

impl LockSnapshot {
    pub fn capture(project: &Project) -> Self {
        Self {
            hashes: project
                .env_specs()
                .values()
                .map(|spec| (spec.name.clone(), spec.logical_hash()))
                .collect(),
        }
    }

    /// Logical hash `name` had, if it existed.
    pub fn hash_of(&self, name: &str) -> Option<&str> {
        self.hashes.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hashes.keys().map(String::as_str)
    }
}

/// Resolve `env_spec` and tag the result with its logical hash.
///
/// The failure status names the env spec and carries the resolver error.
pub(crate) fn resolve_env_spec(
    resolver: &dyn DependencyResolver,
    env_spec: &EnvSpec,
) -> Result<LockSet, Status> {
    if env_spec.platforms.is_empty() {
        return Err(Status::failure(format!(
            "Env spec '{}' does not define any platforms; add some with `projkit add-platforms`.",
            env_spec.name
        )));
    }
    debug!(env_spec = %env_spec.name, "Resolving dependencies");
    resolver
        .resolve(&env_spec.conda_packages, &env_spec.channels, &env_spec.platforms)
        .map(|lock_set| lock_set.with_env_spec_hash(env_spec.logical_hash()))
        .map_err(|e| {
            Status::failure(format!("Error resolving dependencies for {}: {e}.", env_spec.name))
                .with_error(e.to_string())
        })
}

/// Diff lines for replacing `old` with `new`, with a heading.
pub(crate) fn describe_changes(name: &str, old: &LockSet, new: &LockSet) -> Vec<String> {
    if !old.enabled() || old.missing_from_lock_file() {
        return Vec::new();
    }
    let diff = new.diff_from(old);
    if diff.is_empty() {
        return diff;
    }
    let mut lines = vec![format!("Changes to locked dependencies for {name}:")];
    lines.extend(diff);
    lines
}

/// Re-resolve every locked env spec that changed since `snapshot` or whose
/// lock set is stale, and drop lock entries of removed env specs.
///
/// Writes only to the working copy of the lock document. On failure nothing
/// was written for any env spec; the caller reloads the project.
pub fn reconcile(
    resolver: &dyn DependencyResolver,
    project: &mut Project,
    snapshot: &LockSnapshot,
) -> Status {
    let roster = project.env_spec_names();
    let env_specs: Vec<EnvSpec> = project.env_specs().values().cloned().collect();

    let mut logs = Vec::new();
    let mut updates: Vec<(String, LockSet)> = Vec::new();
    for env_spec in &env_specs {
        let lock_set = &env_spec.lock_set;
        if !lock_set.enabled() {
            continue;
        }
        let hash = env_spec.logical_hash();
        let changed = snapshot.hash_of(&env_spec.name) != Some(hash.as_str());
        if !changed && !lock_set.is_stale_for(&hash) {
            debug!(env_spec = %env_spec.name, "Lock set unchanged, skipping resolution");
            logs.push(format!(
                "Locked dependencies for env spec {} are already up to date.",
                env_spec.name
            ));
            continue;
        }

        let resolved = match resolve_env_spec(resolver, env_spec) {
            Ok(resolved) => resolved,
            Err(status) => return status.prepend_logs(logs),
        };
        logs.extend(describe_changes(&env_spec.name, lock_set, &resolved));
        logs.push(format!(
            "Updated locked dependencies for env spec {} in {LOCK_FILE_NAME}.",
            env_spec.name
        ));
        updates.push((env_spec.name.clone(), resolved));
    }

    let removed: Vec<String> =
        snapshot.names().filter(|name| !roster.iter().any(|r| r == name)).map(str::to_string).collect();
    if updates.is_empty() && removed.is_empty() {
        return Status::success("Lock file is up to date.").with_logs(logs);
    }

    let lock_file = project.lock_file_mut();
    for (name, lock_set) in &updates {
        info!(env_spec = %name, "Writing lock set");
        lock_file.set_lock_set(name, lock_set, &roster);
    }
    for name in &removed {
        if lock_file.unset_env_spec(name) {
            debug!(env_spec = %name, "Removed lock entry");
        }
    }

    project.use_changes_without_saving();
    if let Some(problems) = project.problems_status(None) {
        return problems.prepend_logs(logs);
    }
    Status::success("Lock file updated.").with_logs(logs)
}
