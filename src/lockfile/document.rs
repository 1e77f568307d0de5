//! The lock document, `projkit.lock`.

use super::LockSet;
use crate::constants::LOCK_FILE_NAME;
use crate::document::{ConfigDocument, array};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use toml_edit::{Array, Item, Table, Value, value};
use tracing::debug;

const TEMPLATE: &str = "\
# Pinned dependency versions for each env spec in projkit.toml.
#
# Commit this file so everyone installs the same packages. It is rewritten by
# `projkit lock` and `projkit update`; set locking_enabled = false (or run
# `projkit unlock`) to stop pinning.

locking_enabled = false
";

/// Typed access to the lock document.
#[derive(Debug, Clone)]
pub struct LockFile {
    document: ConfigDocument,
}

impl LockFile {
    /// Open `projkit.lock` in `project_dir`.
    pub fn open(project_dir: &Path) -> Result<Self> {
        Ok(Self {
            document: ConfigDocument::open(project_dir.join(LOCK_FILE_NAME), TEMPLATE)?,
        })
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    pub fn load(&mut self) -> Result<()> {
        self.document.load()
    }

    pub fn save(&mut self) -> Result<()> {
        self.document.save()
    }

    pub fn use_changes_without_saving(&mut self) {
        self.document.use_changes_without_saving();
    }

    /// Put back the text captured with [`ConfigDocument::disk_snapshot`].
    pub fn restore_disk_snapshot(&mut self, snapshot: Option<String>) -> Result<()> {
        self.document.restore_disk_snapshot(snapshot)
    }

    /// Whether env specs without their own `locked` flag are locked.
    pub fn locking_enabled(&self) -> bool {
        self.document.get_bool(&["locking_enabled"]).unwrap_or(false)
    }

    /// Names that have an entry under `env_specs`.
    pub fn env_spec_names(&self) -> Vec<String> {
        self.document
            .get_table_like(&["env_specs"])
            .map(|t| t.iter().map(|(k, _)| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// Problems with the structure of the document.
    pub fn problems(&self) -> Vec<String> {
        let file = self.document.basename();
        if let Some(reason) = self.document.parse_error() {
            return vec![reason.to_string()];
        }

        let mut problems = Vec::new();
        if let Some(item) = self.document.get(&["locking_enabled"])
            && !item.is_bool()
        {
            problems.push(format!("{file}: locking_enabled should be true or false"));
        }

        let Some(item) = self.document.get(&["env_specs"]) else {
            return problems;
        };
        let Some(entries) = item.as_table_like() else {
            problems.push(format!("{file}: env_specs should be a table"));
            return problems;
        };

        for (name, entry) in entries.iter() {
            let Some(entry) = entry.as_table_like() else {
                problems.push(format!("{file}: env_specs.{name} should be a table"));
                continue;
            };
            if entry.get("locked").is_some_and(|v| !v.is_bool()) {
                problems.push(format!("{file}: env_specs.{name}.locked should be true or false"));
            }
            if entry.get("env_spec_hash").is_some_and(|v| !v.is_str()) {
                problems.push(format!("{file}: env_specs.{name}.env_spec_hash should be a string"));
            }
            if entry.get("platforms").is_some_and(|v| !is_string_array(v)) {
                problems.push(format!(
                    "{file}: env_specs.{name}.platforms should be a list of strings"
                ));
            }
            if let Some(packages) = entry.get("packages") {
                let valid = packages
                    .as_table_like()
                    .is_some_and(|t| t.iter().all(|(_, v)| is_string_array(v)));
                if !valid {
                    problems.push(format!(
                        "{file}: env_specs.{name}.packages should map platforms to lists of strings"
                    ));
                }
            }
        }
        problems
    }

    /// The lock set stored for env spec `name`.
    ///
    /// An entry's own `locked` flag wins over `locking_enabled`. An env spec
    /// that should be locked but has no entry gets [`LockSet::missing`].
    pub fn lock_set_for(&self, name: &str) -> LockSet {
        let entry = self.document.get_table_like(&["env_specs", name]);
        let enabled = entry
            .and_then(|e| e.get("locked"))
            .and_then(Item::as_bool)
            .unwrap_or_else(|| self.locking_enabled());

        let Some(entry) = entry else {
            return if enabled {
                LockSet::missing()
            } else {
                LockSet::disabled()
            };
        };

        let platforms = entry
            .get("platforms")
            .and_then(Item::as_array)
            .map(array::strings)
            .unwrap_or_default();

        let mut all = Vec::new();
        let mut specific = BTreeMap::new();
        if let Some(packages) = entry.get("packages").and_then(Item::as_table_like) {
            for (key, records) in packages.iter() {
                let records = records.as_array().map(array::strings).unwrap_or_default();
                if key == "all" {
                    all = records;
                } else {
                    specific.insert(key.to_string(), records);
                }
            }
        }

        let lock_set = LockSet::from_factored(platforms, &all, &specific).with_enabled(enabled);
        match entry.get("env_spec_hash").and_then(Item::as_str) {
            Some(hash) => lock_set.with_env_spec_hash(hash),
            None => lock_set,
        }
    }

    /// Store `lock_set` for env spec `name` and lock it.
    ///
    /// `all_names` is the roster of every env spec in the project. When
    /// locking was off globally, the other rostered env specs are explicitly
    /// marked unlocked before it is switched on, and entries for names that
    /// are not in the roster are dropped.
    pub fn set_lock_set(&mut self, name: &str, lock_set: &LockSet, all_names: &[String]) {
        if !self.locking_enabled() {
            for other in all_names.iter().filter(|other| *other != name) {
                let explicitly_locked = self
                    .document
                    .get_bool(&["env_specs", other.as_str(), "locked"])
                    .unwrap_or(false);
                if !explicitly_locked {
                    self.document.set_value(&["env_specs", other.as_str(), "locked"], value(false));
                }
            }
            self.document.set_value(&["locking_enabled"], value(true));
        }

        self.document.set_value(&["env_specs", name, "locked"], value(true));
        if let Some(hash) = lock_set.env_spec_hash() {
            self.document.set_value(&["env_specs", name, "env_spec_hash"], value(hash));
        }
        self.document.set_value(
            &["env_specs", name, "platforms"],
            value(array::string_array(lock_set.platforms())),
        );

        let (all, specific) = lock_set.factored();
        let mut packages = Table::new();
        packages.insert("all", value(multiline_array(&all)));
        for (platform, records) in &specific {
            packages.insert(platform, value(multiline_array(records)));
        }
        self.document.set_value(&["env_specs", name, "packages"], Item::Table(packages));

        for stale in self.env_spec_names() {
            if !all_names.contains(&stale) {
                debug!(env_spec = %stale, "Dropping lock entry for removed env spec");
                self.document.unset_value(&["env_specs", stale.as_str()]);
            }
        }
    }

    /// Update only the recorded hash of env spec `name`.
    pub fn set_lock_set_hash(&mut self, name: &str, hash: &str) {
        self.document.set_value(&["env_specs", name, "env_spec_hash"], value(hash));
    }

    /// Stop locking one env spec, or every env spec when `name` is `None`.
    pub fn disable_locking(&mut self, name: Option<&str>) {
        match name {
            None => {
                self.document.set_value(&["locking_enabled"], value(false));
                self.document.unset_value(&["env_specs"]);
            }
            Some(name) => {
                self.document.unset_value(&["env_specs", name]);
                self.document.set_value(&["env_specs", name, "locked"], value(false));
            }
        }
    }

    /// Drop the entry of env spec `name`. Returns whether there was one.
    pub fn unset_env_spec(&mut self, name: &str) -> bool {
        self.document.unset_value(&["env_specs", name])
    }
}

fn is_string_array(item: &Item) -> bool {
    item.as_array().is_some_and(|a| a.iter().all(Value::is_str))
}

fn multiline_array(records: &[String]) -> Array {
    let mut array = Array::new();
    for record in records {
        array.push_formatted(Value::from(record.as_str()).decorated("\n    ", ""));
    }
    if !records.is_empty() {
        array.set_trailing_comma(true);
        array.set_trailing("\n");
    }
    array
}
