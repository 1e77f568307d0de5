//! Per-user state kept next to the project, `projkit-local.toml`.
//!
//! Holds variable values the user set and the run state of services this
//! machine started. It is not shared through source control and is never part
//! of a project transaction: changes are saved directly.

use crate::constants::LOCAL_STATE_FILE_NAME;
use crate::document::ConfigDocument;
use anyhow::Result;
use std::path::Path;
use toml_edit::{Item, value};

const TEMPLATE: &str = "\
# Your personal settings for this project. Do not commit this file.
";

/// The local state document.
#[derive(Debug, Clone)]
pub struct LocalState {
    document: ConfigDocument,
}

impl LocalState {
    pub fn open(project_dir: &Path) -> Result<Self> {
        Ok(Self {
            document: ConfigDocument::open(project_dir.join(LOCAL_STATE_FILE_NAME), TEMPLATE)?,
        })
    }

    pub fn save(&mut self) -> Result<()> {
        self.document.save()
    }

    pub fn parse_error(&self) -> Option<&str> {
        self.document.parse_error()
    }

    /// Value the user stored for variable `name`.
    pub fn variable(&self, name: &str) -> Option<String> {
        let item = self.document.get(&["variables", name])?;
        item.as_str()
            .map(str::to_string)
            .or_else(|| item.as_value().map(|v| v.to_string().trim().to_string()))
    }

    pub fn set_variable(&mut self, name: &str, new_value: &str) {
        self.document.set_value(&["variables", name], value(new_value));
    }

    /// Returns whether a value was stored.
    pub fn unset_variable(&mut self, name: &str) -> bool {
        self.document.unset_value(&["variables", name])
    }

    /// Remembered run state of the service providing `env_var`.
    pub fn service_run_state(&self, env_var: &str) -> Option<&dyn toml_edit::TableLike> {
        self.document.get_table_like(&["service_run_states", env_var])
    }

    pub fn set_service_run_state(&mut self, env_var: &str, state: toml_edit::Table) {
        self.document.set_value(&["service_run_states", env_var], Item::Table(state));
    }

    pub fn clear_service_run_state(&mut self, env_var: &str) -> bool {
        self.document.unset_value(&["service_run_states", env_var])
    }
}
