//! Whole-project operations: creating a project, setting its properties and
//! cleaning up everything it prepared.

use crate::constants::{DEFAULT_PROJECT_IGNORE, ENVS_DIR, PROJECT_IGNORE_FILE_NAME, SERVICES_DIR};
use crate::core::Status;
use crate::document::array::push_unique;
use crate::env_spec::platform::default_platforms_with_current;
use crate::prepare::PrepareResult;
use crate::project::Project;
use crate::requirements::RequirementRegistry;
use crate::transaction::Coordinator;
use crate::utils::fs::{ensure_dir, remove_dir_all, safe_write};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use toml_edit::value;
use tracing::{info, warn};

/// Name, icon and description of a project; `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectProperties {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
}

impl ProjectProperties {
    fn apply(&self, project: &mut Project) {
        let doc = project.project_file_mut();
        for (key, field) in [("name", &self.name), ("icon", &self.icon), ("description", &self.description)] {
            if let Some(field) = field {
                doc.set_value(&[key], value(field.as_str()));
            }
        }
    }
}

/// Create a project in `directory`, or open the one already there.
///
/// A new project gets the default platforms and a `.projectignore`. The
/// project file is only written when the result has no problems; check
/// [`Project::problems`] on the returned project.
pub fn create(
    directory: &Path,
    make_directory: bool,
    properties: &ProjectProperties,
    registry: Arc<RequirementRegistry>,
) -> Result<Project> {
    if make_directory {
        ensure_dir(directory)?;
    }

    let ignore_file = directory.join(PROJECT_IGNORE_FILE_NAME);
    if directory.is_dir()
        && !ignore_file.exists()
        && let Err(e) = safe_write(&ignore_file, DEFAULT_PROJECT_IGNORE)
    {
        warn!(path = %ignore_file.display(), error = %e, "Failed to write ignore file");
    }

    let mut project = Project::open(directory, registry)?;
    if !project.project_file().exists_on_disk()
        && project.global_platforms().is_empty()
        && let Some(platforms) = project.project_file_mut().array_mut(&["platforms"])
    {
        for platform in default_platforms_with_current() {
            push_unique(platforms, &platform);
        }
    }
    properties.apply(&mut project);
    project.use_changes_without_saving();

    if project.problems().is_empty() {
        project
            .project_file_mut()
            .save()
            .with_context(|| format!("Failed to create project in {}", directory.display()))?;
        info!(project = %directory.display(), "Created project");
    }
    Ok(project)
}

impl Coordinator<'_> {
    /// Change the project's name, icon or description.
    pub fn set_properties(&self, project: &mut Project, properties: &ProjectProperties) -> Result<Status> {
        self.commit_validated_edit(
            project,
            "Project properties updated.",
            "Failed to set project properties.",
            |project| {
                properties.apply(project);
                Ok(())
            },
        )
    }

    /// Tear down everything `prepare_result` provided, then delete the
    /// project's environments and service state.
    pub fn clean(&self, project: &Project, prepare_result: &PrepareResult) -> Status {
        let status = self.engine().unprepare(project, prepare_result, None);
        let mut logs = status.logs.clone();
        let mut errors = status.errors.clone();
        if !status.is_success() {
            errors.insert(0, status.description.clone());
        }

        for dir_name in [SERVICES_DIR, ENVS_DIR] {
            let dir = project.directory().join(dir_name);
            if !dir.exists() {
                continue;
            }
            logs.push(format!("Removing {}.", dir.display()));
            if let Err(e) = remove_dir_all(&dir) {
                errors.push(format!("Error removing {}: {e:#}.", dir.display()));
            }
        }

        if errors.is_empty() {
            Status::success("Cleaned.").with_logs(logs)
        } else {
            Status::failure("Failed to clean everything up.").with_logs(logs).with_errors(errors)
        }
    }
}
