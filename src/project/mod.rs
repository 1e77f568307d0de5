//! A project: its config document, its lock document and the model derived
//! from both.
//!
//! The model (env specs, commands, requirements, problems) is re-derived
//! whenever the documents are loaded or their working copies are promoted with
//! [`Project::use_changes_without_saving`]. Edits made directly on a document
//! are invisible to the model until then.
//!
//! Saving writes the lock document first and the project document second. If
//! the second write fails the first one is undone, so the two files on disk
//! always belong to the same transaction.

pub mod command;
pub mod local_state;
mod parse;

pub use command::{CommandType, ProjectCommand};
pub use local_state::LocalState;

use crate::constants::PROJECT_FILE_NAME;
use crate::core::{PROBLEMS_DESCRIPTION, Status};
use crate::document::ConfigDocument;
use crate::env_spec::EnvSpec;
use crate::lockfile::LockFile;
use crate::requirements::{ProvideTarget, Requirement, RequirementRegistry};
use anyhow::Result;
use indexmap::IndexMap;
use parse::ProjectModel;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toml_edit::Value;
use tracing::{debug, warn};

/// An open project directory.
#[derive(Debug)]
pub struct Project {
    directory: PathBuf,
    project_file: ConfigDocument,
    lock_file: LockFile,
    registry: Arc<RequirementRegistry>,
    model: ProjectModel,
}

impl Project {
    /// Open the project in `directory`.
    ///
    /// A missing `projkit.toml` is not an error: the project starts from the
    /// default template and the file is written on the first save.
    pub fn open(directory: impl Into<PathBuf>, registry: Arc<RequirementRegistry>) -> Result<Self> {
        let directory = directory.into();
        let project_file = ConfigDocument::open(
            directory.join(PROJECT_FILE_NAME),
            project_template(&directory),
        )?;
        let lock_file = LockFile::open(&directory)?;

        let mut project = Self {
            directory,
            project_file,
            lock_file,
            registry,
            model: ProjectModel::default(),
        };
        project.refresh();
        Ok(project)
    }

    fn refresh(&mut self) {
        self.model =
            parse::parse(&self.directory, &self.project_file, &self.lock_file, &self.registry);
    }

    /// Throw away unsaved changes in both documents.
    pub fn load(&mut self) -> Result<()> {
        debug!(project = %self.directory.display(), "Reloading project documents");
        self.project_file.load()?;
        self.lock_file.load()?;
        self.refresh();
        Ok(())
    }

    /// Throw away unsaved changes in the lock document only.
    pub fn reload_lock_file(&mut self) -> Result<()> {
        self.lock_file.load()?;
        self.refresh();
        Ok(())
    }

    /// Promote both working copies and re-derive the model from them.
    pub fn use_changes_without_saving(&mut self) {
        self.project_file.use_changes_without_saving();
        self.lock_file.use_changes_without_saving();
        self.refresh();
    }

    /// Persist both documents, lock document first.
    pub fn save(&mut self) -> Result<()> {
        let lock_snapshot = self.lock_file.document().disk_snapshot();
        self.lock_file.save()?;

        if let Err(e) = self.project_file.save() {
            warn!(error = %e, "Saving the project file failed; restoring the lock file");
            if let Err(restore) = self.lock_file.restore_disk_snapshot(lock_snapshot) {
                warn!(error = %restore, "Could not restore the lock file");
            }
            return Err(e);
        }
        debug!(project = %self.directory.display(), "Saved project documents");
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn project_file(&self) -> &ConfigDocument {
        &self.project_file
    }

    pub fn project_file_mut(&mut self) -> &mut ConfigDocument {
        &mut self.project_file
    }

    pub fn lock_file(&self) -> &LockFile {
        &self.lock_file
    }

    pub fn lock_file_mut(&mut self) -> &mut LockFile {
        &mut self.lock_file
    }

    pub fn registry(&self) -> &Arc<RequirementRegistry> {
        &self.registry
    }

    /// Problems found in the documents as of the last load or promotion.
    pub fn problems(&self) -> &[String] {
        &self.model.problems
    }

    /// A failure status listing the problems, or `None` when there are none.
    pub fn problems_status(&self, description: Option<&str>) -> Option<Status> {
        if self.model.problems.is_empty() {
            None
        } else {
            Some(Status::problems(
                description.unwrap_or(PROBLEMS_DESCRIPTION),
                &self.model.problems,
            ))
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.model.name.as_deref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.model.icon.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.model.description.as_deref()
    }

    /// Env specs in declaration order.
    pub fn env_specs(&self) -> &IndexMap<String, EnvSpec> {
        &self.model.env_specs
    }

    pub fn env_spec(&self, name: &str) -> Option<&EnvSpec> {
        self.model.env_specs.get(name)
    }

    /// The roster of env spec names.
    pub fn env_spec_names(&self) -> Vec<String> {
        self.model.env_specs.keys().cloned().collect()
    }

    pub fn default_env_spec_name(&self) -> &str {
        &self.model.default_env_spec_name
    }

    /// The top-level `platforms` list.
    pub fn global_platforms(&self) -> &[String] {
        &self.model.global_platforms
    }

    /// Whether the project file has an `env_specs` section.
    pub fn declares_env_specs(&self) -> bool {
        self.project_file.get(&["env_specs"]).is_some()
    }

    pub fn commands(&self) -> &IndexMap<String, ProjectCommand> {
        &self.model.commands
    }

    /// Requirements in prepare order; the environment always comes first.
    pub fn requirements(&self) -> &[Requirement] {
        &self.model.requirements
    }

    pub fn find_requirement(&self, target: &ProvideTarget) -> Option<&Requirement> {
        self.model.requirements.iter().find(|r| target.matches(r))
    }
}

fn project_template(directory: &Path) -> String {
    let name = directory
        .file_name()
        .map_or_else(|| "project".to_string(), |n| n.to_string_lossy().into_owned());
    format!(
        "\
# projkit project file
#
# Edit by hand or with the projkit commands (add-packages, add-command, ...).

name = {name}

# Packages, channels and platforms here are shared by every env spec.
packages = []
channels = []
platforms = []

[env_specs.default]
description = \"Default environment spec for running commands\"
packages = []
channels = []
",
        name = Value::from(name)
    )
}
