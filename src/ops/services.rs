//! Service requirement operations.

use crate::core::Status;
use crate::prepare::PrepareResult;
use crate::project::Project;
use crate::requirements::{ProvideTarget, Requirement};
use crate::transaction::Coordinator;
use anyhow::Result;
use toml_edit::value;

impl Coordinator<'_> {
    /// Add a service of type `service_type`, published through `env_var`
    /// (the type's default variable when `None`), and start it.
    pub fn add_service(
        &self,
        project: &mut Project,
        service_type: &str,
        env_var: Option<&str>,
    ) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        let registry = project.registry();
        let Some(known) = registry.service_type(service_type) else {
            return Ok(Status::failure("Unable to add service.").with_error(format!(
                "Unknown service type '{service_type}', we know about: {}",
                registry.service_type_names()
            )));
        };
        let env_var = env_var.unwrap_or(known.default_variable).to_string();

        let target = ProvideTarget::Variable(env_var.clone());
        let already_declared = match project.find_requirement(&target) {
            None => false,
            Some(Requirement::Service {
                service_type: existing,
                ..
            }) if existing == service_type => true,
            Some(_) => {
                return Ok(Status::failure("Unable to add service.")
                    .with_error(format!("Variable {env_var} is already in use.")));
            }
        };

        self.with_staged_edit(project, target, None, |project| {
            if !already_declared {
                project.project_file_mut().set_value(&["services", env_var.as_str()], value(service_type));
            }
            Ok(())
        })
    }

    /// Stop and drop the service named `name`, by variable or by type.
    pub fn remove_service(
        &self,
        project: &mut Project,
        prepare_result: &PrepareResult,
        name: &str,
    ) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        let matches: Vec<String> = project
            .requirements()
            .iter()
            .filter_map(|r| match r {
                Requirement::Service {
                    env_var,
                    service_type,
                } if env_var == name || service_type == name => Some(env_var.clone()),
                _ => None,
            })
            .collect();
        let env_var = match matches.as_slice() {
            [] => return Ok(Status::failure(format!("Service '{name}' not found in the project file."))),
            [env_var] => env_var.clone(),
            _ => {
                return Ok(Status::failure(format!(
                    "Conflicting results, found {} matches, use list-services to identify which service you want to remove.",
                    matches.len()
                )));
            }
        };

        let target = ProvideTarget::Variable(env_var.clone());
        let stopped = self.engine().unprepare(project, prepare_result, Some(&[target]));
        if !stopped.is_success() {
            return Ok(stopped);
        }
        let status = self.commit_validated_edit(
            project,
            format!("Removed service '{name}' from the project file."),
            "Unable to remove the service.",
            |project| {
                project.project_file_mut().unset_value(&["services", env_var.as_str()]);
                Ok(())
            },
        )?;
        Ok(status.prepend_logs(stopped.logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROJECT_FILE_NAME;
    use crate::prepare::RegistryPrepareEngine;
    use crate::test_utils::{FakeResolver, TestProject};
    use std::collections::BTreeMap;

    fn engine_with_redis() -> RegistryPrepareEngine {
        let mut environ = BTreeMap::new();
        environ.insert("REDIS_URL".to_string(), "redis://localhost:6379".to_string());
        RegistryPrepareEngine::with_environ(environ)
    }

    #[test]
    fn test_add_and_remove_service() {
        let project = TestProject::new("name = \"demo\"\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine_with_redis());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.add_service(&mut opened, "redis", None).unwrap();
        assert!(status.is_success(), "{status}");
        assert!(project.read(PROJECT_FILE_NAME).contains("REDIS_URL = \"redis\""));

        let previous = PrepareResult::unprepared(&opened, None);
        let status = coordinator.remove_service(&mut opened, &previous, "redis").unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(status.description, "Removed service 'redis' from the project file.");
        assert!(!project.read(PROJECT_FILE_NAME).contains("REDIS_URL"));
    }

    #[test]
    fn test_unknown_service_type() {
        let project = TestProject::new("name = \"demo\"\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine_with_redis());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.add_service(&mut opened, "mongo", None).unwrap();
        assert!(!status.is_success());
        assert_eq!(status.errors, ["Unknown service type 'mongo', we know about: redis"]);
    }

    #[test]
    fn test_variable_in_use() {
        let project = TestProject::new("name = \"demo\"\n\n[variables]\nREDIS_URL = \"x\"\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine_with_redis());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.add_service(&mut opened, "redis", None).unwrap();
        assert!(!status.is_success());
        assert_eq!(status.errors, ["Variable REDIS_URL is already in use."]);
    }

    #[test]
    fn test_remove_missing_service() {
        let project = TestProject::new("name = \"demo\"\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine_with_redis());
        let coordinator = Coordinator::new(&resolver, &engine);

        let previous = PrepareResult::unprepared(&opened, None);
        let status = coordinator.remove_service(&mut opened, &previous, "redis").unwrap();
        assert_eq!(status.description, "Service 'redis' not found in the project file.");
    }
}
