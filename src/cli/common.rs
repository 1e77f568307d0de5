//! Shared plumbing for CLI commands: finding the project, serializing access
//! to it and printing the resulting [`Status`].

use crate::config::GlobalConfig;
use crate::constants::PROJECT_FILE_NAME;
use crate::core::{ProjkitError, Status};
use crate::prepare::RegistryPrepareEngine;
use crate::project::Project;
use crate::transaction::Coordinator;
use crate::utils::project_lock::ProjectLock;
use anyhow::{Context, Result, anyhow};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

/// `--env-spec` option shared by several commands.
#[derive(Args, Debug, Clone, Default)]
pub struct EnvSpecArg {
    /// Environment spec to operate on (all or the default one when omitted)
    #[arg(short = 'n', long = "env-spec")]
    pub env_spec: Option<String>,
}

impl EnvSpecArg {
    pub fn as_deref(&self) -> Option<&str> {
        self.env_spec.as_deref()
    }
}

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Project directory
    pub directory: PathBuf,
    /// Global user configuration
    pub config: GlobalConfig,
    /// Only print failures
    pub quiet: bool,
}

impl CommandContext {
    pub async fn load(directory: Option<PathBuf>, config_path: Option<PathBuf>, quiet: bool) -> Result<Self> {
        let directory = match directory {
            Some(directory) => directory,
            None => std::env::current_dir().context("Failed to determine the current directory")?,
        };
        let config = GlobalConfig::load_with_optional(config_path).await?;
        Ok(Self {
            directory,
            config,
            quiet,
        })
    }

    fn require_project_file(&self) -> Result<()> {
        if self.directory.join(PROJECT_FILE_NAME).is_file() {
            Ok(())
        } else {
            Err(anyhow!(
                "No {PROJECT_FILE_NAME} found in {}. Run 'projkit init' to create a project.",
                self.directory.display()
            ))
        }
    }

    /// Open the project read-only and hand it to `read`.
    pub fn read_project<T>(&self, read: impl FnOnce(&Project) -> Result<T>) -> Result<T> {
        self.require_project_file()?;
        let project = Project::open(&self.directory, self.config.registry())?;
        read(&project)
    }

    /// Run a transaction against the project.
    ///
    /// The project lock is held for the whole operation, which runs on the
    /// blocking pool since resolvers, builders and downloads block.
    pub async fn transact<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Project, &Coordinator<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.require_project_file()?;
        let directory = self.directory.clone();
        let registry = self.config.registry();
        let resolver = self.config.resolver_or_unconfigured();

        self.locked(move || {
            let mut project = Project::open(directory, registry)?;
            let engine = RegistryPrepareEngine::new();
            let coordinator = Coordinator::new(resolver.as_ref(), &engine);
            debug!(project = %project.directory().display(), "Running project operation");
            operation(&mut project, &coordinator)
        })
        .await
    }

    /// Run `operation` on the blocking pool while holding the project lock.
    pub async fn locked<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _lock = ProjectLock::acquire(&self.directory, self.config.lock_timeout()).await?;
        tokio::task::spawn_blocking(operation).await.context("Project operation panicked")?
    }

    /// Print `status` and turn a failed one into an error for the exit code.
    pub fn finish(&self, status: Status) -> Result<()> {
        print_status(&status, self.quiet);
        if status.is_success() {
            Ok(())
        } else {
            Err(ProjkitError::OperationFailed {
                description: status.description,
            }
            .into())
        }
    }
}

/// Logs and description on stdout; on failure errors and description on
/// stderr.
pub fn print_status(status: &Status, quiet: bool) {
    if status.is_success() {
        if quiet {
            return;
        }
        for line in &status.logs {
            println!("{line}");
        }
        println!("{}", status.description.green());
    } else {
        if !quiet {
            for line in &status.logs {
                println!("{line}");
            }
        }
        for line in &status.errors {
            eprintln!("{line}");
        }
        eprintln!("{}", status.description.red());
    }
}

/// Print a failed `status` and wrap it for the exit code.
pub fn report_failure(status: Status) -> anyhow::Error {
    print_status(&status, false);
    ProjkitError::OperationFailed {
        description: status.description,
    }
    .into()
}

/// Report a project's problems, if it has any.
pub fn problems_error(project: &Project) -> Result<()> {
    match project.problems_status(None) {
        Some(status) => Err(report_failure(status)),
        None => Ok(()),
    }
}

/// Print a titled list the way the `list-*` commands do.
pub fn print_listing(title: &str, rows: &[(String, String)]) {
    if rows.is_empty() {
        println!("No {} found for project.", title.to_lowercase());
        return;
    }
    println!("{}", title.bold());
    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, detail) in rows {
        if detail.is_empty() {
            println!("  {name}");
        } else {
            println!("  {name:<width$}  {}", detail.dimmed());
        }
    }
}
