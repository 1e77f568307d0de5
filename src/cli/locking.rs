//! `lock`, `update` and `unlock`.

use super::common::{CommandContext, EnvSpecArg};
use anyhow::Result;
use clap::Args;

/// Resolve dependencies and record them in the lock file.
///
/// Turns locking on for the selected env spec, or for every env spec.
#[derive(Args, Debug)]
pub struct LockCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,
}

impl LockCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.lock(project, self.env_spec.as_deref()))
            .await?;
        ctx.finish(status)
    }
}

/// Re-resolve dependencies, updating the lock file where locking is on and
/// the installed environment where it is off.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,
}

impl UpdateCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.update(project, self.env_spec.as_deref()))
            .await?;
        ctx.finish(status)
    }
}

/// Stop using the lock file for the selected env spec, or for all of them.
#[derive(Args, Debug)]
pub struct UnlockCommand {
    #[command(flatten)]
    env_spec: EnvSpecArg,
}

impl UnlockCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let status = ctx
            .transact(move |project, coordinator| coordinator.unlock(project, self.env_spec.as_deref()))
            .await?;
        ctx.finish(status)
    }
}
