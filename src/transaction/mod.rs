//! The transaction coordinator.
//!
//! Every mutation of a project goes through a [`Coordinator`]:
//!
//! 1. refuse to start when the project already has problems
//! 2. snapshot the logical hash of every env spec
//! 3. apply the edit to the working copies (memory only)
//! 4. promote the working copies and re-validate
//! 5. reconcile the lock document ([`lock_sync::reconcile`])
//! 6. prepare the environment plus the requirement the operation is about
//! 7. save both documents when that worked
//!
//! Any failure after step 3 reloads both documents from disk, so a failed
//! operation leaves memory and disk exactly as they were.

pub mod lock_sync;

pub use lock_sync::LockSnapshot;

use crate::core::{ProjkitError, Status};
use crate::prepare::PrepareEngine;
use crate::project::Project;
use crate::requirements::{ProvideTarget, RequirementKind};
use crate::resolver::DependencyResolver;
use anyhow::Result;
use tracing::{debug, info, warn};

/// Runs staged edits against a resolver and a prepare engine.
#[derive(Clone, Copy)]
pub struct Coordinator<'a> {
    resolver: &'a dyn DependencyResolver,
    engine: &'a dyn PrepareEngine,
}

impl<'a> Coordinator<'a> {
    pub fn new(resolver: &'a dyn DependencyResolver, engine: &'a dyn PrepareEngine) -> Self {
        Self {
            resolver,
            engine,
        }
    }

    pub fn resolver(&self) -> &'a dyn DependencyResolver {
        self.resolver
    }

    pub fn engine(&self) -> &'a dyn PrepareEngine {
        self.engine
    }

    /// Apply `edit`, then check that `target` (and the environment) can be
    /// provided with env spec `env_spec_name`, and save only if so.
    ///
    /// `edit` may refuse bad input by returning a failure status. Logs of the
    /// lock reconciliation come before those of the prepare step.
    ///
    /// # Errors
    ///
    /// Saving failed, reloading after a failure failed, or the prepare engine
    /// broke its contract. Expected failures are `Ok` with a failed status.
    pub fn with_staged_edit<F>(
        &self,
        project: &mut Project,
        target: ProvideTarget,
        env_spec_name: Option<&str>,
        edit: F,
    ) -> Result<Status>
    where
        F: FnOnce(&mut Project) -> Result<(), Status>,
    {
        let staged = self.stage_edit(project, edit)?;
        if !staged.is_success() {
            return Ok(staged);
        }
        let status = self.commit_requirement_if_it_works(project, &target, env_spec_name)?;
        Ok(status.prepend_logs(staged.logs))
    }

    /// Steps 1 to 5: edit, promote, re-validate and reconcile the lock
    /// document, without preparing or saving.
    ///
    /// On failure the project has been reloaded. On success the edit is
    /// promoted but unsaved.
    pub fn stage_edit<F>(&self, project: &mut Project, edit: F) -> Result<Status>
    where
        F: FnOnce(&mut Project) -> Result<(), Status>,
    {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }

        let snapshot = LockSnapshot::capture(project);
        if let Err(status) = edit(project) {
            debug!(reason = %status.description, "Edit refused");
            project.load()?;
            return Ok(status);
        }

        project.use_changes_without_saving();
        if let Some(problems) = project.problems_status(None) {
            debug!(problems = project.problems().len(), "Edit introduced problems, reverting");
            project.load()?;
            return Ok(problems);
        }

        let status = lock_sync::reconcile(self.resolver, project, &snapshot);
        if !status.is_success() {
            debug!(reason = %status.description, "Lock reconciliation failed, reverting");
            project.load()?;
        }
        Ok(status)
    }

    /// Apply an edit that needs no requirement check and save it.
    ///
    /// Returns `Status::success(description)` once saved. Problems the edit
    /// introduces are reported under `failure_description`.
    pub fn commit_validated_edit<F>(
        &self,
        project: &mut Project,
        description: impl Into<String>,
        failure_description: &str,
        edit: F,
    ) -> Result<Status>
    where
        F: FnOnce(&mut Project) -> Result<(), Status>,
    {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        if let Err(status) = edit(project) {
            project.load()?;
            return Ok(status);
        }
        project.use_changes_without_saving();
        if let Some(problems) = project.problems_status(Some(failure_description)) {
            project.load()?;
            return Ok(problems);
        }
        save_or_reload(project)?;
        Ok(Status::success(description))
    }

    /// Promote the working copies, try `target`, and save on success or
    /// reload on failure.
    pub fn commit_requirement_if_it_works(
        &self,
        project: &mut Project,
        target: &ProvideTarget,
        env_spec_name: Option<&str>,
    ) -> Result<Status> {
        project.use_changes_without_saving();
        let status = match self.try_requirement_without_commit(project, target, env_spec_name) {
            Ok(status) => status,
            Err(e) => {
                project.load()?;
                return Err(e);
            }
        };
        if status.is_success() {
            save_or_reload(project)?;
        } else {
            debug!(reason = %status.description, "Requirement not met, reverting");
            project.load()?;
        }
        Ok(status)
    }

    /// Prepare the environment and `target` against the promoted state
    /// without saving or reverting anything.
    ///
    /// The returned status is the one for `target`, carrying the logs of the
    /// whole prepare run. When the project has no requirement matching
    /// `target`, the overall prepare status is returned.
    ///
    /// # Errors
    ///
    /// [`ProjkitError::ContractViolation`] when the engine reached the
    /// requirements but left out the status of one the project has, whether
    /// or not the prepare run as a whole succeeded. A run that failed before
    /// selecting any requirement ([`PrepareResult::failed`]) is reported as
    /// an ordinary failure.
    ///
    /// [`PrepareResult::failed`]: crate::prepare::PrepareResult::failed
    pub fn try_requirement_without_commit(
        &self,
        project: &mut Project,
        target: &ProvideTarget,
        env_spec_name: Option<&str>,
    ) -> Result<Status> {
        project.use_changes_without_saving();
        let whitelist = [ProvideTarget::Kind(RequirementKind::Environment), target.clone()];
        let result = self.engine.prepare(project, Some(&whitelist), env_spec_name);

        let Some(status) = result.status_for(target) else {
            if let Some(problems) = project.problems_status(None) {
                return Ok(problems);
            }
            // a run that got as far as the requirements owes a status for
            // every selected one, failed or not
            if project.find_requirement(target).is_some() && result.env_spec_name.is_some() {
                return Err(ProjkitError::ContractViolation {
                    message: format!("prepare returned no status for {target}"),
                }
                .into());
            }
            return Ok(result.status);
        };

        if !result.is_success() && status.is_success() {
            // the target was fine but something it depends on was not
            return Ok(result.status);
        }
        let mut status = status.clone();
        status.logs = result.status.logs;
        Ok(status)
    }

    /// Install from the promoted lock document, then put the lock document
    /// back the way it is on disk, whatever the outcome.
    pub fn apply_lock_file_then_revert(
        &self,
        project: &mut Project,
        env_spec_name: &str,
    ) -> Result<Status> {
        project.use_changes_without_saving();
        let whitelist = [ProvideTarget::Kind(RequirementKind::Environment)];
        let result = self.engine.prepare(project, Some(&whitelist), Some(env_spec_name));
        debug!(env_spec = %env_spec_name, "Reverting the lock file after install");
        project.reload_lock_file()?;
        Ok(result.status)
    }
}

/// Save both documents; on failure reload so memory matches disk again.
pub(crate) fn save_or_reload(project: &mut Project) -> Result<()> {
    if let Err(e) = project.save() {
        warn!(error = %e, "Save failed, reloading project");
        project.load()?;
        return Err(e);
    }
    info!(project = %project.directory().display(), "Committed project changes");
    Ok(())
}
