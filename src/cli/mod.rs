//! Command-line interface for projkit.
//!
//! Every subcommand maps onto one project operation. Mutating commands take
//! the project lock, run the operation on the blocking pool and print the
//! resulting status; `list-*` commands only read the project.
//!
//! # Available Commands
//!
//! ## Project
//! - `init` - create a project (and its directory)
//! - `set-properties` - change name, icon or description
//! - `prepare` - set up everything the project needs
//! - `clean` - remove everything `prepare` created
//!
//! ## Environments
//! - `add-env-spec`, `remove-env-spec`, `export-env-spec`, `list-env-specs`
//! - `add-packages`, `remove-packages`, `list-packages`
//! - `add-platforms`, `remove-platforms`, `list-platforms`
//! - `lock`, `update`, `unlock`
//!
//! ## Requirements and commands
//! - `add-download`, `remove-download`, `list-downloads`
//! - `add-service`, `remove-service`, `list-services`
//! - `add-variable`, `remove-variable`, `set-variable`, `unset-variable`,
//!   `list-variables`
//! - `add-command`, `update-command`, `remove-command`, `list-commands`
//!
//! # Global Options
//!
//! - `--directory` - project directory (the current directory by default)
//! - `--config` - path to the global config file
//! - `--verbose` - debug logging
//! - `--quiet` - only print failures
//!
//! # Example
//!
//! ```bash
//! projkit init --name demo
//! projkit add-packages numpy
//! projkit lock
//! ```

mod commands;
pub mod common;
mod env_specs;
mod locking;
mod project;
mod requirements;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::CommandContext;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "projkit",
    about = "Manage reproducible data science project directories",
    version,
    long_about = "projkit keeps a project's environments, downloads, services, variables and \
                  commands in projkit.toml, and pins dependencies in projkit.lock."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory
    #[arg(long, global = true)]
    directory: Option<PathBuf>,

    /// Path to the global config file
    #[arg(long, global = true, env = "PROJKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print failures
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Init(project::InitCommand),
    SetProperties(project::SetPropertiesCommand),
    Prepare(project::PrepareCommand),
    Clean(project::CleanCommand),

    AddEnvSpec(env_specs::AddEnvSpecCommand),
    RemoveEnvSpec(env_specs::RemoveEnvSpecCommand),
    ExportEnvSpec(env_specs::ExportEnvSpecCommand),
    ListEnvSpecs(env_specs::ListEnvSpecsCommand),
    AddPackages(env_specs::AddPackagesCommand),
    RemovePackages(env_specs::RemovePackagesCommand),
    ListPackages(env_specs::ListPackagesCommand),
    AddPlatforms(env_specs::AddPlatformsCommand),
    RemovePlatforms(env_specs::RemovePlatformsCommand),
    ListPlatforms(env_specs::ListPlatformsCommand),

    Lock(locking::LockCommand),
    Update(locking::UpdateCommand),
    Unlock(locking::UnlockCommand),

    AddDownload(requirements::AddDownloadCommand),
    RemoveDownload(requirements::RemoveDownloadCommand),
    ListDownloads(requirements::ListDownloadsCommand),
    AddService(requirements::AddServiceCommand),
    RemoveService(requirements::RemoveServiceCommand),
    ListServices(requirements::ListServicesCommand),
    AddVariable(requirements::AddVariableCommand),
    RemoveVariable(requirements::RemoveVariableCommand),
    SetVariable(requirements::SetVariableCommand),
    UnsetVariable(requirements::UnsetVariableCommand),
    ListVariables(requirements::ListVariablesCommand),

    AddCommand(commands::AddCommandArgs),
    UpdateCommand(commands::UpdateCommandArgs),
    RemoveCommand(commands::RemoveCommandArgs),
    ListCommands(commands::ListCommandsArgs),
}

impl Cli {
    /// Log level when `RUST_LOG` is not set.
    fn default_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_log_level()));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        let ctx = CommandContext::load(self.directory, self.config, self.quiet).await?;

        match self.command {
            Commands::Init(cmd) => cmd.execute(&ctx).await,
            Commands::SetProperties(cmd) => cmd.execute(&ctx).await,
            Commands::Prepare(cmd) => cmd.execute(&ctx).await,
            Commands::Clean(cmd) => cmd.execute(&ctx).await,

            Commands::AddEnvSpec(cmd) => cmd.execute(&ctx).await,
            Commands::RemoveEnvSpec(cmd) => cmd.execute(&ctx).await,
            Commands::ExportEnvSpec(cmd) => cmd.execute(&ctx),
            Commands::ListEnvSpecs(cmd) => cmd.execute(&ctx),
            Commands::AddPackages(cmd) => cmd.execute(&ctx).await,
            Commands::RemovePackages(cmd) => cmd.execute(&ctx).await,
            Commands::ListPackages(cmd) => cmd.execute(&ctx),
            Commands::AddPlatforms(cmd) => cmd.execute(&ctx).await,
            Commands::RemovePlatforms(cmd) => cmd.execute(&ctx).await,
            Commands::ListPlatforms(cmd) => cmd.execute(&ctx),

            Commands::Lock(cmd) => cmd.execute(&ctx).await,
            Commands::Update(cmd) => cmd.execute(&ctx).await,
            Commands::Unlock(cmd) => cmd.execute(&ctx).await,

            Commands::AddDownload(cmd) => cmd.execute(&ctx).await,
            Commands::RemoveDownload(cmd) => cmd.execute(&ctx).await,
            Commands::ListDownloads(cmd) => cmd.execute(&ctx),
            Commands::AddService(cmd) => cmd.execute(&ctx).await,
            Commands::RemoveService(cmd) => cmd.execute(&ctx).await,
            Commands::ListServices(cmd) => cmd.execute(&ctx),
            Commands::AddVariable(cmd) => cmd.execute(&ctx).await,
            Commands::RemoveVariable(cmd) => cmd.execute(&ctx).await,
            Commands::SetVariable(cmd) => cmd.execute(&ctx).await,
            Commands::UnsetVariable(cmd) => cmd.execute(&ctx).await,
            Commands::ListVariables(cmd) => cmd.execute(&ctx),

            Commands::AddCommand(cmd) => cmd.execute(&ctx).await,
            Commands::UpdateCommand(cmd) => cmd.execute(&ctx).await,
            Commands::RemoveCommand(cmd) => cmd.execute(&ctx).await,
            Commands::ListCommands(cmd) => cmd.execute(&ctx),
        }
    }
}
