//! Environment specs.
//!
//! An [`EnvSpec`] is one named, reproducible environment: the packages it
//! needs, the channels they come from and the platforms it must work on. Its
//! [`EnvSpec::logical_hash`] summarizes exactly those inputs, so a lock set
//! tagged with an older hash is known to be out of date.

pub mod package_spec;
pub mod platform;

use crate::constants::ENVS_DIR;
use crate::lockfile::LockSet;
use crate::utils::fs::safe_write;
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub use package_spec::{PackageSpec, parse_spec, record_name};

/// One named environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSpec {
    pub name: String,
    pub description: Option<String>,
    /// Package specs, inherited global ones first
    pub conda_packages: Vec<String>,
    /// Specs from `{ pip = [...] }` entries
    pub pip_packages: Vec<String>,
    /// Channels, inherited global ones first, without duplicates
    pub channels: Vec<String>,
    /// Target platforms without duplicates
    pub platforms: Vec<String>,
    pub lock_set: LockSet,
}

#[derive(Serialize)]
struct HashInputs<'a> {
    channels: &'a [String],
    packages: Vec<&'a String>,
    pip: Vec<&'a String>,
    platforms: Vec<&'a String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Dependency<'a> {
    Conda(&'a str),
    Pip { pip: &'a [String] },
}

#[derive(Serialize)]
struct EnvironmentFile<'a> {
    name: &'a str,
    channels: &'a [String],
    dependencies: Vec<Dependency<'a>>,
}

impl EnvSpec {
    /// An unlocked env spec.
    pub fn new(
        name: impl Into<String>,
        conda_packages: Vec<String>,
        channels: Vec<String>,
        platforms: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            conda_packages,
            pip_packages: Vec::new(),
            channels,
            platforms,
            lock_set: LockSet::disabled(),
        }
    }

    /// Digest of the inputs that affect dependency resolution.
    ///
    /// Package and platform order do not matter; channel order does, because
    /// it sets channel priority.
    pub fn logical_hash(&self) -> String {
        let mut packages: Vec<&String> = self.conda_packages.iter().collect();
        packages.sort();
        let mut pip: Vec<&String> = self.pip_packages.iter().collect();
        pip.sort();
        let mut platforms: Vec<&String> = self.platforms.iter().collect();
        platforms.sort();

        let inputs = HashInputs {
            channels: &self.channels,
            packages,
            pip,
            platforms,
        };
        // Serializing plain strings and vectors cannot fail
        let canonical = serde_json::to_string(&inputs).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Directory the environment is built in.
    pub fn path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(ENVS_DIR).join(&self.name)
    }

    /// Names of the conda packages, in declaration order.
    pub fn conda_package_names(&self) -> Vec<&str> {
        self.conda_packages
            .iter()
            .filter_map(|spec| parse_spec(spec).map(|_| record_name(spec)))
            .collect()
    }

    /// Render as a conda `environment.yml` document.
    pub fn to_environment_yaml(&self) -> Result<String> {
        let mut dependencies: Vec<Dependency<'_>> =
            self.conda_packages.iter().map(|p| Dependency::Conda(p)).collect();
        if !self.pip_packages.is_empty() {
            dependencies.push(Dependency::Pip {
                pip: &self.pip_packages,
            });
        }
        let file = EnvironmentFile {
            name: &self.name,
            channels: &self.channels,
            dependencies,
        };
        serde_yaml::to_string(&file)
            .with_context(|| format!("Failed to serialize env spec {}", self.name))
    }

    /// Write [`EnvSpec::to_environment_yaml`] to `path`.
    pub fn save_environment_yml(&self, path: &Path) -> Result<()> {
        let yaml = self.to_environment_yaml()?;
        safe_write(path, &yaml)
    }
}

/// Combine inherited global packages with an env spec's own.
///
/// A spec of the env spec replaces a global spec for the same package name.
pub fn merge_packages(global: &[String], own: &[String]) -> Vec<String> {
    let own_names: Vec<&str> = own.iter().map(|s| record_name(s)).collect();
    global
        .iter()
        .filter(|spec| !own_names.contains(&record_name(spec)))
        .chain(own.iter())
        .cloned()
        .collect()
}

/// Concatenate without duplicates, keeping first occurrences.
pub fn merge_unique(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for item in first.iter().chain(second.iter()) {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}
