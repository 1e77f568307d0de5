//! Download, service and variable commands.

use super::common::{CommandContext, print_listing, problems_error};
use crate::prepare::PrepareResult;
use crate::requirements::{HashAlgorithm, Requirement};
use anyhow::Result;
use clap::Args;
use std::collections::BTreeMap;

fn parse_hash_algorithm(s: &str) -> Result<HashAlgorithm, String> {
    HashAlgorithm::from_key(s).ok_or_else(|| {
        let known: Vec<&str> = HashAlgorithm::ALL.iter().map(|a| a.key()).collect();
        format!("unsupported hash algorithm '{s}', expected one of: {}", known.join(", "))
    })
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

/// Add a file to download before the project runs.
#[derive(Args, Debug)]
pub struct AddDownloadCommand {
    /// Variable that will hold the path of the downloaded file
    env_var: String,

    url: String,

    /// File name to save as (defaults to the last part of the URL)
    #[arg(short, long)]
    filename: Option<String>,

    /// Algorithm of `--hash-value`
    #[arg(long, value_parser = parse_hash_algorithm, requires = "hash_value")]
    hash_algorithm: Option<HashAlgorithm>,

    /// Expected checksum of the file
    #[arg(long, requires = "hash_algorithm")]
    hash_value: Option<String>,
}

impl AddDownloadCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let hash = self.hash_algorithm.zip(self.hash_value);
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.add_download(project, &self.env_var, &self.url, self.filename.as_deref(), hash)
            })
            .await?;
        ctx.finish(status)
    }
}

/// Remove a download and the downloaded file.
#[derive(Args, Debug)]
pub struct RemoveDownloadCommand {
    env_var: String,
}

impl RemoveDownloadCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                let previous = PrepareResult::unprepared(project, None);
                coordinator.remove_download(project, &previous, &self.env_var)
            })
            .await?;
        ctx.finish(status)
    }
}

/// List the project's downloads.
#[derive(Args, Debug)]
pub struct ListDownloadsCommand {}

impl ListDownloadsCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.read_project(|project| {
            problems_error(project)?;
            let rows: Vec<(String, String)> = project
                .requirements()
                .iter()
                .filter_map(|r| match r {
                    Requirement::Download {
                        env_var,
                        url,
                        ..
                    } => Some((env_var.clone(), url.clone())),
                    _ => None,
                })
                .collect();
            print_listing("Downloads", &rows);
            Ok(())
        })
    }
}

/// Add a service the project needs running, such as redis.
#[derive(Args, Debug)]
pub struct AddServiceCommand {
    /// Service type
    service_type: String,

    /// Variable for the service address (the type's usual one by default)
    #[arg(long)]
    variable: Option<String>,
}

impl AddServiceCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                coordinator.add_service(project, &self.service_type, self.variable.as_deref())
            })
            .await?;
        ctx.finish(status)
    }
}

/// Stop and remove a service, named by variable or type.
#[derive(Args, Debug)]
pub struct RemoveServiceCommand {
    name: String,
}

impl RemoveServiceCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| {
                let previous = PrepareResult::unprepared(project, None);
                coordinator.remove_service(project, &previous, &self.name)
            })
            .await?;
        ctx.finish(status)
    }
}

/// List the project's services.
#[derive(Args, Debug)]
pub struct ListServicesCommand {}

impl ListServicesCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.read_project(|project| {
            problems_error(project)?;
            let rows: Vec<(String, String)> = project
                .requirements()
                .iter()
                .filter_map(|r| match r {
                    Requirement::Service {
                        env_var,
                        service_type,
                    } => Some((env_var.clone(), service_type.clone())),
                    _ => None,
                })
                .collect();
            print_listing("Services", &rows);
            Ok(())
        })
    }
}

/// Declare variables the project reads.
#[derive(Args, Debug)]
pub struct AddVariableCommand {
    /// Default value for the variables
    #[arg(long)]
    default: Option<String>,

    #[arg(required = true)]
    names: Vec<String>,
}

impl AddVariableCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let defaults: BTreeMap<String, String> = match &self.default {
            Some(default) => self.names.iter().map(|n| (n.clone(), default.clone())).collect(),
            None => BTreeMap::new(),
        };
        let status = ctx
            .transact(move |project, coordinator| coordinator.add_variables(project, &self.names, &defaults))
            .await?;
        ctx.finish(status)
    }
}

/// Remove variable declarations and their stored values.
#[derive(Args, Debug)]
pub struct RemoveVariableCommand {
    #[arg(required = true)]
    names: Vec<String>,
}

impl RemoveVariableCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.remove_variables(project, &self.names))
            .await?;
        ctx.finish(status)
    }
}

/// Store values for declared variables in the local state file.
#[derive(Args, Debug)]
pub struct SetVariableCommand {
    /// Assignments such as `PORT=8080`
    #[arg(required = true, value_parser = parse_assignment)]
    assignments: Vec<(String, String)>,
}

impl SetVariableCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.set_variables(project, &self.assignments))
            .await?;
        ctx.finish(status)
    }
}

/// Forget the stored values of variables.
#[derive(Args, Debug)]
pub struct UnsetVariableCommand {
    #[arg(required = true)]
    names: Vec<String>,
}

impl UnsetVariableCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.unset_variables(project, &self.names))
            .await?;
        ctx.finish(status)
    }
}

/// List the project's variables.
#[derive(Args, Debug)]
pub struct ListVariablesCommand {}

impl ListVariablesCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        ctx.read_project(|project| {
            problems_error(project)?;
            let rows: Vec<(String, String)> = project
                .requirements()
                .iter()
                .filter_map(|r| match r {
                    Requirement::Variable {
                        env_var,
                        description,
                        ..
                    } => Some((env_var.clone(), description.clone().unwrap_or_default())),
                    _ => None,
                })
                .collect();
            print_listing("Variables", &rows);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("A=b=c").unwrap(), ("A".to_string(), "b=c".to_string()));
        assert_eq!(parse_assignment("A=").unwrap(), ("A".to_string(), String::new()));
        assert!(parse_assignment("=b").is_err());
        assert!(parse_assignment("A").is_err());
    }

    #[test]
    fn test_parse_hash_algorithm() {
        assert_eq!(parse_hash_algorithm("sha384").unwrap(), HashAlgorithm::Sha384);
        let err = parse_hash_algorithm("md5").unwrap_err();
        assert!(err.contains("sha256"), "{err}");
    }
}
