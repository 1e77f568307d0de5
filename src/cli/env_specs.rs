//! Env spec, package and platform commands.

use super::common::{CommandContext, EnvSpecArg, print_listing, problems_error, report_failure};
use crate::env_spec::EnvSpec;
use crate::ops::env_specs::export_env_spec;
use crate::ops::unknown_env_spec;
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// Add a new environment spec to the project.
#[derive(Args, Debug)]
pub struct AddEnvSpecCommand {
    /// Name of the environment spec
    #[arg(short = 'n', long = "name")]
    name: String,

    /// Channel to search for packages, may be repeated
    #[arg(short = 'c', long = "channel")]
    channels: Vec<String>,

    /// Packages to put in the environment
    packages: Vec<String>,
}

impl AddEnvSpecCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.add_env_spec(project, &self.name, &self.packages, &self.channels)
            })
            .await?;
        ctx.finish(status)
    }
}

/// Remove an environment spec and its environment.
#[derive(Args, Debug)]
pub struct RemoveEnvSpecCommand {
    /// Name of the environment spec
    #[arg(short = 'n', long = "name")]
    name: String,
}

impl RemoveEnvSpecCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.remove_env_spec(project, &self.name))
            .await?;
        ctx.finish(status)
    }
}

/// Write an environment spec as a conda `environment.yml` file.
#[derive(Args, Debug)]
pub struct ExportEnvSpecCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,

    /// File to write
    filename: PathBuf,
}

impl ExportEnvSpecCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status =
            ctx.read_project(|project| Ok(export_env_spec(project, self.env_spec.as_deref(), &self.filename)))?;
        ctx.finish(status)
    }
}

/// List the project's environment specs.
#[derive(Args, Debug)]
pub struct ListEnvSpecsCommand {}

impl ListEnvSpecsCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.read_project(|project| {
            problems_error(project)?;
            let rows: Vec<(String, String)> = project
                .env_specs()
                .values()
                .map(|spec| (spec.name.clone(), spec.description.clone().unwrap_or_default()))
                .collect();
            print_listing("Environments", &rows);
            Ok(())
        })
    }
}

/// Add packages to one environment spec, or to all of them.
#[derive(Args, Debug)]
pub struct AddPackagesCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,

    /// Channel to search for packages, may be repeated
    #[arg(short = 'c', long = "channel")]
    channels: Vec<String>,

    /// Package specs such as `numpy` or `scipy>=1.10`
    #[arg(required = true)]
    packages: Vec<String>,
}

impl AddPackagesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.add_packages(project, self.env_spec.as_deref(), &self.packages, &self.channels)
            })
            .await?;
        ctx.finish(status)
    }
}

/// Remove packages from one environment spec, or from all of them.
#[derive(Args, Debug)]
pub struct RemovePackagesCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,

    /// Package names or exact specs
    #[arg(required = true)]
    packages: Vec<String>,
}

impl RemovePackagesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.remove_packages(project, self.env_spec.as_deref(), &self.packages)
            })
            .await?;
        ctx.finish(status)
    }
}

/// List the packages of an environment spec (the default one when omitted).
#[derive(Args, Debug)]
pub struct ListPackagesCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,
}

impl ListPackagesCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.read_project(|project| {
            let spec = selected_env_spec(project, self.env_spec.as_deref())?;
            let mut rows: Vec<(String, String)> =
                spec.conda_packages.iter().map(|p| (p.clone(), String::new())).collect();
            rows.extend(spec.pip_packages.iter().map(|p| (p.clone(), "pip".to_string())));
            print_listing(&format!("Packages for environment '{}'", spec.name), &rows);
            Ok(())
        })
    }
}

/// Add target platforms to one environment spec, or to all of them.
#[derive(Args, Debug)]
pub struct AddPlatformsCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,

    /// Platform names such as `linux-64` or `osx-arm64`
    #[arg(required = true)]
    platforms: Vec<String>,
}

impl AddPlatformsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.add_platforms(project, self.env_spec.as_deref(), &self.platforms)
            })
            .await?;
        ctx.finish(status)
    }
}

/// Remove target platforms from one environment spec, or from all of them.
#[derive(Args, Debug)]
pub struct RemovePlatformsCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,

    #[arg(required = true)]
    platforms: Vec<String>,
}

impl RemovePlatformsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.remove_platforms(project, self.env_spec.as_deref(), &self.platforms)
            })
            .await?;
        ctx.finish(status)
    }
}

/// List the target platforms of an environment spec.
#[derive(Args, Debug)]
pub struct ListPlatformsCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,
}

impl ListPlatformsCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.read_project(|project| {
            let spec = selected_env_spec(project, self.env_spec.as_deref())?;
            let rows: Vec<(String, String)> =
                spec.platforms.iter().map(|p| (p.clone(), String::new())).collect();
            print_listing(&format!("Platforms for environment '{}'", spec.name), &rows);
            Ok(())
        })
    }
}

fn selected_env_spec<'a>(project: &'a Project, name: Option<&str>) -> Result<&'a EnvSpec> {
    problems_error(project)?;
    let name = name.unwrap_or_else(|| project.default_env_spec_name());
    project.env_spec(name).ok_or_else(|| report_failure(unknown_env_spec(project, name)))
}
