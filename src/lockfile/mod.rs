//! Pinned dependency sets and the lock document that stores them.
//!
//! A [`LockSet`] is the fully pinned package list resolved for one env spec,
//! kept per platform and tagged with the logical hash of the env spec it was
//! resolved for. [`LockFile`] reads and writes lock sets in `projkit.lock`:
//!
//! ```toml
//! locking_enabled = true
//!
//! [env_specs.default]
//! locked = true
//! env_spec_hash = "6f1c..."
//! platforms = ["linux-64", "osx-64"]
//!
//! [env_specs.default.packages]
//! all = ["numpy=1.26.0=0"]
//! linux-64 = ["libgcc=13.2=0"]
//! ```
//!
//! Records shared by every platform are stored once under `all`.

pub mod document;

pub use document::LockFile;

use crate::env_spec::package_spec::record_name;
use std::collections::{BTreeMap, BTreeSet};

/// Pinned packages for one env spec.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockSet {
    enabled: bool,
    missing: bool,
    env_spec_hash: Option<String>,
    platforms: Vec<String>,
    packages: BTreeMap<String, Vec<String>>,
}

impl LockSet {
    /// An enabled lock set holding `packages` (platform -> records).
    ///
    /// Platforms without an entry in `packages` get an empty record list.
    pub fn new<P, S>(platforms: P, packages: BTreeMap<String, Vec<String>>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let platforms: BTreeSet<String> = platforms.into_iter().map(Into::into).collect();
        let packages = platforms
            .iter()
            .map(|platform| {
                let mut records = packages.get(platform).cloned().unwrap_or_default();
                records.sort();
                records.dedup();
                (platform.clone(), records)
            })
            .collect();
        Self {
            enabled: true,
            missing: false,
            env_spec_hash: None,
            platforms: platforms.into_iter().collect(),
            packages,
        }
    }

    /// Rebuild a lock set from its stored form (`all` plus per-platform records).
    pub fn from_factored(
        platforms: Vec<String>,
        all: &[String],
        specific: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let packages = platforms
            .iter()
            .map(|platform| {
                let mut records = all.to_vec();
                records.extend(specific.get(platform).into_iter().flatten().cloned());
                (platform.clone(), records)
            })
            .collect();
        Self::new(platforms, packages)
    }

    /// A lock set for an env spec that is not locked.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// An enabled lock set with no entry in the lock document.
    pub fn missing() -> Self {
        Self {
            enabled: true,
            missing: true,
            ..Self::default()
        }
    }

    /// Tag with the logical hash of the env spec this was resolved for.
    #[must_use]
    pub fn with_env_spec_hash(mut self, hash: impl Into<String>) -> Self {
        self.env_spec_hash = Some(hash.into());
        self
    }

    /// Same records with a different enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn missing_from_lock_file(&self) -> bool {
        self.missing
    }

    pub fn env_spec_hash(&self) -> Option<&str> {
        self.env_spec_hash.as_deref()
    }

    /// Platforms this lock set was resolved for, sorted.
    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    /// Pinned records for `platform`, sorted.
    pub fn records_for(&self, platform: &str) -> &[String] {
        self.packages.get(platform).map_or(&[], Vec::as_slice)
    }

    /// Whether `platform` was part of the resolution.
    pub fn supports_platform(&self, platform: &str) -> bool {
        self.platforms.iter().any(|p| p == platform)
    }

    /// Whether this lock set is out of date for an env spec whose logical
    /// hash is `logical_hash`.
    pub fn is_stale_for(&self, logical_hash: &str) -> bool {
        self.enabled && (self.missing || self.env_spec_hash.as_deref() != Some(logical_hash))
    }

    /// Same enabled flag, platforms and records; the hash is not compared.
    pub fn equivalent_to(&self, other: &Self) -> bool {
        self.enabled == other.enabled
            && self.platforms == other.platforms
            && self.packages == other.packages
    }

    /// Split into records shared by every platform and the per-platform rest.
    pub fn factored(&self) -> (Vec<String>, BTreeMap<String, Vec<String>>) {
        let mut lists = self.packages.values();
        let shared: BTreeSet<&String> = match lists.next() {
            Some(first) => {
                let mut shared: BTreeSet<&String> = first.iter().collect();
                for records in lists {
                    let here: BTreeSet<&String> = records.iter().collect();
                    shared.retain(|r| here.contains(r));
                }
                shared
            }
            None => BTreeSet::new(),
        };

        let specific = self
            .packages
            .iter()
            .map(|(platform, records)| {
                let rest = records.iter().filter(|r| !shared.contains(r)).cloned().collect();
                (platform.clone(), rest)
            })
            .collect();
        (shared.into_iter().cloned().collect(), specific)
    }

    /// Human-readable changes going from `old` to `self`.
    ///
    /// Lines look like `    + scipy=1.11.0=0`, `    - six=1.16=0` or
    /// `    ~ numpy=1.25.0=0 -> numpy=1.26.0=0`, grouped under a `  <platform>:`
    /// header, or a single `  all:` header when every platform changed the
    /// same way. Empty when nothing changed.
    pub fn diff_from(&self, old: &Self) -> Vec<String> {
        let platforms: BTreeSet<&String> =
            self.platforms.iter().chain(old.platforms.iter()).collect();

        let per_platform: Vec<(&String, Vec<String>)> = platforms
            .into_iter()
            .map(|platform| {
                let changes =
                    diff_records(old.records_for(platform), self.records_for(platform));
                (platform, changes)
            })
            .filter(|(_, changes)| !changes.is_empty())
            .collect();

        let mut lines = Vec::new();
        let all_platforms = self.platforms.len().max(old.platforms.len());
        let same_everywhere = per_platform.len() > 1
            && per_platform.len() == all_platforms
            && per_platform.windows(2).all(|pair| pair[0].1 == pair[1].1);

        if same_everywhere {
            lines.push("  all:".to_string());
            lines.extend(per_platform[0].1.iter().map(|c| format!("    {c}")));
        } else {
            for (platform, changes) in per_platform {
                lines.push(format!("  {platform}:"));
                lines.extend(changes.iter().map(|c| format!("    {c}")));
            }
        }
        lines
    }
}

fn diff_records(old: &[String], new: &[String]) -> Vec<String> {
    let old_by_name: BTreeMap<&str, &String> = old.iter().map(|r| (record_name(r), r)).collect();
    let new_by_name: BTreeMap<&str, &String> = new.iter().map(|r| (record_name(r), r)).collect();
    let names: BTreeSet<&str> = old_by_name.keys().chain(new_by_name.keys()).copied().collect();

    names
        .into_iter()
        .filter_map(|name| match (old_by_name.get(name), new_by_name.get(name)) {
            (None, Some(added)) => Some(format!("+ {added}")),
            (Some(removed), None) => Some(format!("- {removed}")),
            (Some(before), Some(after)) if before != after => {
                Some(format!("~ {before} -> {after}"))
            }
            _ => None,
        })
        .collect()
}
