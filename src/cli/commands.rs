//! `add-command`, `update-command`, `remove-command` and `list-commands`.

use super::common::{CommandContext, print_listing, problems_error};
use crate::ops::commands::CommandSpec;
use crate::project::CommandType;
use anyhow::Result;
use clap::Args;

/// Add a runnable command to the project.
#[derive(Args, Debug)]
pub struct AddCommandArgs {
    /// Command name
    name: String,

    /// Command line, notebook file or app directory, depending on `--type`
    command: String,

    /// One of `unix`, `windows`, `notebook`, `bokeh_app`
    #[arg(long = "type", default_value = "unix")]
    command_type: CommandType,

    /// Env spec the command runs in
    #[arg(short = 'n', long = "env-spec")]
    env_spec: Option<String>,

    /// Whether the command accepts the standard HTTP options
    #[arg(long)]
    supports_http_options: Option<bool>,
}

impl AddCommandArgs {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                let spec = CommandSpec {
                    command_type: self.command_type,
                    command: &self.command,
                    env_spec: self.env_spec.as_deref(),
                    supports_http_options: self.supports_http_options,
                };
                coordinator.add_command(project, &self.name, &spec)
            })
            .await?;
        ctx.finish(status)
    }
}

/// Rename a command or change its command line.
#[derive(Args, Debug)]
pub struct UpdateCommandArgs {
    name: String,

    /// New command line (requires `--type`)
    command: Option<String>,

    #[arg(long = "type")]
    command_type: Option<CommandType>,

    /// New name for the command
    #[arg(long)]
    new_name: Option<String>,
}

impl UpdateCommandArgs {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.update_command(
                    project,
                    &self.name,
                    self.command_type,
                    self.command.as_deref(),
                    self.new_name.as_deref(),
                )
            })
            .await?;
        ctx.finish(status)
    }
}

/// Remove a command.
#[derive(Args, Debug)]
pub struct RemoveCommandArgs {
    name: String,
}

impl RemoveCommandArgs {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.remove_command(project, &self.name))
            .await?;
        ctx.finish(status)
    }
}

/// List the project's commands.
#[derive(Args, Debug)]
pub struct ListCommandsArgs {}

impl ListCommandsArgs {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.read_project(|project| {
            problems_error(project)?;
            let rows: Vec<(String, String)> = project
                .commands()
                .values()
                .map(|command| (command.name.clone(), command.summary().to_string()))
                .collect();
            print_listing("Commands", &rows);
            Ok(())
        })
    }
}
