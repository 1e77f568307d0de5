//! Checking that a project's requirements can actually be satisfied.
//!
//! [`PrepareEngine`] is the seam the transaction coordinator validates edits
//! through. [`RegistryPrepareEngine`] walks the project's requirements in
//! order and hands each one to the provider the registry maps its kind to.

use crate::core::Status;
use crate::project::{LocalState, Project};
use crate::requirements::{ProvideContext, ProvideTarget, Requirement};
use std::collections::BTreeMap;
use tracing::debug;

/// Outcome of one prepare run.
#[derive(Debug, Clone)]
pub struct PrepareResult {
    /// One status per requirement that was selected, in prepare order
    pub statuses: Vec<(Requirement, Status)>,
    /// Variables after every provider ran
    pub environ: BTreeMap<String, String>,
    /// Env spec the run was for, when it got that far
    pub env_spec_name: Option<String>,
    /// Overall outcome
    pub status: Status,
}

impl PrepareResult {
    /// A result with no per-requirement statuses.
    pub fn failed(status: Status) -> Self {
        Self {
            statuses: Vec::new(),
            environ: BTreeMap::new(),
            env_spec_name: None,
            status,
        }
    }

    /// A result naming every requirement of the project without providing
    /// any, for tearing down what an earlier run (maybe another process) left.
    pub fn unprepared(project: &Project, env_spec_name: Option<&str>) -> Self {
        let env_spec_name = env_spec_name.unwrap_or_else(|| project.default_env_spec_name());
        Self {
            statuses: project
                .requirements()
                .iter()
                .map(|r| (r.clone(), Status::success(format!("{} was not checked.", r.title()))))
                .collect(),
            environ: BTreeMap::new(),
            env_spec_name: Some(env_spec_name.to_string()),
            status: Status::success("Nothing was prepared."),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Status of the first requirement matching `target`.
    pub fn status_for(&self, target: &ProvideTarget) -> Option<&Status> {
        self.statuses
            .iter()
            .find(|(requirement, _)| target.matches(requirement))
            .map(|(_, status)| status)
    }
}

/// Satisfies (and tears down) a project's requirements.
pub trait PrepareEngine: Send + Sync {
    /// Provide the requirements selected by `whitelist` (all when `None`)
    /// for env spec `env_spec_name` (the default one when `None`).
    ///
    /// Sees the project's promoted, unsaved state.
    fn prepare(
        &self,
        project: &Project,
        whitelist: Option<&[ProvideTarget]>,
        env_spec_name: Option<&str>,
    ) -> PrepareResult;

    /// Undo what `previous` provided, limited to `whitelist` when given.
    fn unprepare(
        &self,
        project: &Project,
        previous: &PrepareResult,
        whitelist: Option<&[ProvideTarget]>,
    ) -> Status;
}

fn selected(whitelist: Option<&[ProvideTarget]>, requirement: &Requirement) -> bool {
    whitelist.is_none_or(|targets| targets.iter().any(|t| t.matches(requirement)))
}

/// The prepare engine backed by the project's [`RequirementRegistry`].
///
/// [`RequirementRegistry`]: crate::requirements::RequirementRegistry
#[derive(Debug, Clone, Default)]
pub struct RegistryPrepareEngine {
    environ: Option<BTreeMap<String, String>>,
}

impl RegistryPrepareEngine {
    /// An engine starting from the process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine starting from `environ` instead of the process environment.
    pub fn with_environ(environ: BTreeMap<String, String>) -> Self {
        Self {
            environ: Some(environ),
        }
    }

    fn initial_environ(&self) -> BTreeMap<String, String> {
        self.environ.clone().unwrap_or_else(|| std::env::vars().collect())
    }
}

impl PrepareEngine for RegistryPrepareEngine {
    fn prepare(
        &self,
        project: &Project,
        whitelist: Option<&[ProvideTarget]>,
        env_spec_name: Option<&str>,
    ) -> PrepareResult {
        if let Some(problems) = project.problems_status(None) {
            return PrepareResult::failed(problems);
        }

        let env_spec_name = env_spec_name.unwrap_or_else(|| project.default_env_spec_name());
        let Some(env_spec) = project.env_spec(env_spec_name) else {
            return PrepareResult::failed(Status::failure(format!(
                "Environment spec {env_spec_name} doesn't exist."
            )));
        };
        let mut local_state = match LocalState::open(project.directory()) {
            Ok(state) => state,
            Err(e) => {
                return PrepareResult::failed(
                    Status::failure("Failed to read local project state.").with_error(format!("{e:#}")),
                );
            }
        };

        let mut environ = self.initial_environ();
        let mut statuses = Vec::new();
        let mut logs = Vec::new();
        let mut failure: Option<Status> = None;

        for requirement in project.requirements().iter().filter(|r| selected(whitelist, r)) {
            if failure.is_some() {
                statuses.push((
                    requirement.clone(),
                    Status::failure(format!(
                        "{} was not attempted because an earlier requirement failed.",
                        requirement.title()
                    )),
                ));
                continue;
            }

            let provider = project.registry().provider_for(requirement.kind());
            let mut context = ProvideContext {
                project_dir: project.directory(),
                env_spec: Some(env_spec),
                environ: &mut environ,
                local_state: &mut local_state,
            };
            let status = provider.provide(requirement, &mut context);
            debug!(
                requirement = %requirement.env_var(),
                success = status.is_success(),
                "Provided requirement"
            );
            logs.extend(status.logs.iter().cloned());
            if !status.is_success() {
                failure = Some(status.clone());
            }
            statuses.push((requirement.clone(), status));
        }

        let status = match failure {
            Some(failed) => Status::failure(failed.description).with_logs(logs).with_errors(failed.errors),
            None => Status::success(format!("Project is ready with env spec {env_spec_name}."))
                .with_logs(logs),
        };
        PrepareResult {
            statuses,
            environ,
            env_spec_name: Some(env_spec_name.to_string()),
            status,
        }
    }

    fn unprepare(
        &self,
        project: &Project,
        previous: &PrepareResult,
        whitelist: Option<&[ProvideTarget]>,
    ) -> Status {
        let mut local_state = match LocalState::open(project.directory()) {
            Ok(state) => state,
            Err(e) => {
                return Status::failure("Failed to read local project state.").with_error(format!("{e:#}"));
            }
        };
        let env_spec = previous.env_spec_name.as_deref().and_then(|name| project.env_spec(name));
        let mut environ = previous.environ.clone();

        let mut logs = Vec::new();
        let mut errors = Vec::new();
        for (requirement, _) in previous.statuses.iter().rev().filter(|(r, _)| selected(whitelist, r)) {
            let provider = project.registry().provider_for(requirement.kind());
            let mut context = ProvideContext {
                project_dir: project.directory(),
                env_spec,
                environ: &mut environ,
                local_state: &mut local_state,
            };
            let status = provider.unprovide(requirement, &mut context);
            if status.is_success() {
                logs.push(status.description);
            } else {
                errors.push(status.description);
                errors.extend(status.errors);
            }
        }

        if errors.is_empty() {
            Status::success("Cleaned up project requirements.").with_logs(logs)
        } else {
            Status::failure("Failed to clean up some project requirements.")
                .with_logs(logs)
                .with_errors(errors)
        }
    }
}
