//! `init`, `set-properties`, `prepare` and `clean`.

use super::common::{CommandContext, EnvSpecArg};
use crate::constants::PROJECT_FILE_NAME;
use crate::core::Status;
use crate::ops::project::{ProjectProperties, create};
use crate::prepare::PrepareResult;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Project name, icon and description flags.
#[derive(Args, Debug, Clone, Default)]
pub struct PropertiesArgs {
    /// Project name
    #[arg(long)]
    pub name: Option<String>,

    /// Icon file, relative to the project directory
    #[arg(long)]
    pub icon: Option<String>,

    /// One-line description of the project
    #[arg(long)]
    pub description: Option<String>,
}

impl PropertiesArgs {
    fn properties(&self) -> ProjectProperties {
        ProjectProperties {
            name: self.name.clone(),
            icon: self.icon.clone(),
            description: self.description.clone(),
        }
    }
}

/// Create a project in the project directory.
///
/// Creates the directory when needed. An existing project is left as it is,
/// apart from the properties given on the command line.
#[derive(Args, Debug)]
pub struct InitCommand {
    #[command(flatten)]
    properties: PropertiesArgs,
}

impl InitCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let directory = ctx.directory.clone();
        let registry = ctx.config.registry();
        let properties = self.properties.properties();
        let existed = directory.join(PROJECT_FILE_NAME).exists();

        let status = ctx
            .locked(move || {
                let project = create(&directory, true, &properties, registry)?;
                Ok(match project.problems_status(Some("Unable to create project.")) {
                    Some(problems) => problems,
                    None if existed => {
                        Status::success(format!("Project already exists in {}", directory.display()))
                    }
                    None => Status::success(format!(
                        "Project configuration is in {}",
                        directory.join(PROJECT_FILE_NAME).display()
                    )),
                })
            })
            .await?;

        if status.is_success() && !existed && !ctx.quiet {
            println!("{} Created projkit project", "✓".green());
        }
        ctx.finish(status)
    }
}

/// Change the project's name, icon or description.
#[derive(Args, Debug)]
pub struct SetPropertiesCommand {
    #[command(flatten)]
    properties: PropertiesArgs,
}

impl SetPropertiesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let properties = self.properties.properties();
        let status = ctx
            .transact(move |project, coordinator| coordinator.set_properties(project, &properties))
            .await?;
        ctx.finish(status)
    }
}

/// Set up everything the project needs: environment, downloads, services
/// and variables.
#[derive(Args, Debug)]
pub struct PrepareCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,
}

impl PrepareCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let env_spec = self.env_spec.env_spec;
        let result = ctx
            .transact(move |project, coordinator| {
                Ok(coordinator.engine().prepare(project, None, env_spec.as_deref()))
            })
            .await?;
        ctx.finish(result.status)
    }
}

/// Remove everything `prepare` created.
#[derive(Args, Debug)]
pub struct CleanCommand {}

impl CleanCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(|project, coordinator| {
                let previous = PrepareResult::unprepared(project, None);
                Ok(coordinator.clean(project, &previous))
            })
            .await?;
        ctx.finish(status)
    }
}
