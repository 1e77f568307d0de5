//! Command operations.

use super::with_suggestion;
use crate::core::Status;
use crate::project::{CommandType, Project};
use crate::transaction::Coordinator;
use anyhow::Result;
use toml_edit::value;

/// What `add-command` is asked to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec<'a> {
    pub command_type: CommandType,
    pub command: &'a str,
    /// Env spec to run in; the project default when `None` on a new command
    pub env_spec: Option<&'a str>,
    pub supports_http_options: Option<bool>,
}

impl Coordinator<'_> {
    /// Add command `name`, or set another command line on it.
    ///
    /// Only `unix` and `windows` command lines can coexist; adding any other
    /// type to an existing command fails as a project problem.
    pub fn add_command(&self, project: &mut Project, name: &str, spec: &CommandSpec<'_>) -> Result<Status> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Status::failure("Unable to add the command.").with_error("A command needs a name."));
        }
        let default_env_spec = project.default_env_spec_name().to_string();
        self.commit_validated_edit(
            project,
            "Command added to project file.",
            "Unable to add the command.",
            |project| {
                let doc = project.project_file_mut();
                doc.set_value(&["commands", name, spec.command_type.key()], value(spec.command));
                match spec.env_spec {
                    Some(env_spec) => doc.set_value(&["commands", name, "env_spec"], value(env_spec)),
                    None if doc.get(&["commands", name, "env_spec"]).is_none() => {
                        doc.set_value(&["commands", name, "env_spec"], value(default_env_spec.as_str()));
                    }
                    None => {}
                }
                if let Some(supports) = spec.supports_http_options {
                    doc.set_value(&["commands", name, "supports_http_options"], value(supports));
                }
                Ok(())
            },
        )
    }

    /// Rename command `name` and/or replace its command line.
    ///
    /// Changing the type drops the command lines the new type can't go with.
    pub fn update_command(
        &self,
        project: &mut Project,
        name: &str,
        command_type: Option<CommandType>,
        command: Option<&str>,
        new_name: Option<&str>,
    ) -> Result<Status> {
        if command_type.is_none() && new_name.is_none() {
            return Ok(Status::success(format!("Nothing to change about command {name}")));
        }
        let replacement = match (command_type, command) {
            (Some(command_type), Some(command)) => Some((command_type, command)),
            (Some(_), None) => {
                return Ok(Status::failure("Failed to update command.")
                    .with_error("A command line is required when changing the command type."));
            }
            (None, _) => None,
        };
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if !project.commands().contains_key(name) {
            return Ok(with_suggestion(
                Status::failure("Failed to update command.").with_error(format!("No command '{name}' found.")),
                name,
                project.commands().keys().map(String::as_str),
            ));
        }
        if let Some(new_name) = new_name
            && new_name != name
            && project.commands().contains_key(new_name)
        {
            return Ok(Status::failure("Failed to update command.")
                .with_error(format!("Command '{new_name}' already exists.")));
        }

        self.commit_validated_edit(
            project,
            "Command updated in project file.",
            "Unable to update the command.",
            |project| {
                let doc = project.project_file_mut();
                let mut target = name;
                if let Some(new_name) = new_name
                    && new_name != name
                {
                    let Some(entry) = doc.get(&["commands", name]).cloned() else {
                        return Err(Status::failure(format!("No command '{name}' found.")));
                    };
                    doc.unset_value(&["commands", name]);
                    doc.set_value(&["commands", new_name], entry);
                    target = new_name;
                }
                if let Some((command_type, command)) = replacement {
                    for other in CommandType::ALL {
                        if !command_type.combines_with(other) {
                            doc.unset_value(&["commands", target, other.key()]);
                        }
                    }
                    doc.set_value(&["commands", target, command_type.key()], value(command));
                }
                Ok(())
            },
        )
    }

    pub fn remove_command(&self, project: &mut Project, name: &str) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if !project.commands().contains_key(name) {
            return Ok(with_suggestion(
                Status::failure(format!("Command: '{name}' not found in project file.")),
                name,
                project.commands().keys().map(String::as_str),
            ));
        }
        self.commit_validated_edit(
            project,
            format!("Command: '{name}' removed from project file."),
            "Unable to remove the command.",
            |project| {
                project.project_file_mut().unset_value(&["commands", name]);
                Ok(())
            },
        )
    }
}
