//! The variable provider.

use super::wrong_kind;
use crate::core::Status;
use crate::requirements::{Keychain, ProvideContext, Provider, Requirement};
use std::sync::Arc;

/// Provides plain variables.
///
/// Looks in the environment first, then at the stored value, then at the
/// declared default. Encrypted variables are stored in the keychain under the
/// environment prefix; the others in local state.
pub struct VariableProvider {
    keychain: Arc<dyn Keychain>,
}

impl VariableProvider {
    pub fn new(keychain: Arc<dyn Keychain>) -> Self {
        Self {
            keychain,
        }
    }

    pub fn keychain(&self) -> &dyn Keychain {
        self.keychain.as_ref()
    }

    fn stored_value(
        &self,
        env_var: &str,
        encrypted: bool,
        context: &ProvideContext<'_>,
    ) -> Result<Option<String>, Status> {
        if !encrypted {
            return Ok(context.local_state.variable(env_var));
        }
        let Some(env_spec) = context.env_spec else {
            return Ok(None);
        };
        let prefix = env_spec.path(context.project_dir);
        self.keychain.get(&prefix, env_var).map_err(|e| {
            Status::failure(format!("Could not read {env_var} from the system keychain."))
                .with_error(format!("{e:#}"))
        })
    }
}

impl Provider for VariableProvider {
    fn provide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status {
        let Requirement::Variable {
            env_var,
            default,
            encrypted,
            ..
        } = requirement
        else {
            return wrong_kind("variable", requirement);
        };

        if context.environ.contains_key(env_var) {
            return Status::success(format!("Using {env_var} from the environment."));
        }
        match self.stored_value(env_var, *encrypted, context) {
            Ok(Some(stored)) => {
                context.environ.insert(env_var.clone(), stored);
                return Status::success(format!("Using the configured value of {env_var}."));
            }
            Ok(None) => {}
            Err(failed) => return failed,
        }
        if let Some(default) = default {
            context.environ.insert(env_var.clone(), default.clone());
            return Status::success(format!("Using the default value of {env_var}."));
        }

        Status::failure(format!("Environment variable {env_var} is not set."))
            .with_error(format!("Set it with `projkit set-variable {env_var}=<value>`."))
    }

    fn unprovide(&self, requirement: &Requirement, _context: &mut ProvideContext<'_>) -> Status {
        match requirement {
            Requirement::Variable {
                env_var,
                ..
            } => Status::success(format!("Nothing to clean up for {env_var}.")),
            other => wrong_kind("variable", other),
        }
    }
}
