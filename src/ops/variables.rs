//! Variable operations.
//!
//! Declaring variables edits the project file. Values the user sets go to the
//! local state file instead, which is never shared, or to the system keychain
//! for variables declared `encrypted`.

use super::{unknown_env_spec, with_suggestion};
use crate::constants::LOCAL_STATE_FILE_NAME;
use crate::core::Status;
use crate::document::ConfigDocument;
use crate::document::array::{filter_in_place, strings};
use crate::project::{LocalState, Project};
use crate::requirements::{Keychain, Requirement};
use crate::transaction::Coordinator;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml_edit::{InlineTable, value};

/// Turn a `variables = ["A", "B"]` list into the table form so entries can
/// carry options.
fn ensure_variables_table(doc: &mut ConfigDocument) {
    let Some(names) = doc.get_array(&["variables"]).map(strings) else {
        return;
    };
    doc.unset_value(&["variables"]);
    for name in names {
        doc.set_value(&["variables", name.as_str()], value(InlineTable::new()));
    }
}

/// Names of the plain variables the project declares, with their
/// `encrypted` flag.
fn declared_variables(project: &Project) -> BTreeMap<String, bool> {
    project
        .requirements()
        .iter()
        .filter_map(|r| match r {
            Requirement::Variable {
                env_var,
                encrypted,
                ..
            } => Some((env_var.clone(), *encrypted)),
            _ => None,
        })
        .collect()
}

/// Prefix of the default env spec; keychain entries are filed under it.
fn env_prefix(project: &Project) -> Result<PathBuf, Status> {
    let name = project.default_env_spec_name();
    project
        .env_spec(name)
        .map(|env_spec| env_spec.path(project.directory()))
        .ok_or_else(|| unknown_env_spec(project, name))
}

/// Drop the stored value of `name` from the keychain or local state,
/// whichever keeps it.
fn forget_value(
    keychain: &dyn Keychain,
    env_prefix: &Path,
    name: &str,
    encrypted: bool,
    local_state: &mut LocalState,
) -> Result<()> {
    if encrypted {
        keychain.unset(env_prefix, name)
    } else {
        local_state.unset_variable(name);
        Ok(())
    }
}

impl Coordinator<'_> {
    /// Declare `names` as variables. Names found in `defaults` get that
    /// default value; already declared variables keep their options.
    pub fn add_variables(
        &self,
        project: &mut Project,
        names: &[String],
        defaults: &BTreeMap<String, String>,
    ) -> Result<Status> {
        let declared = declared_variables(project);
        self.commit_validated_edit(
            project,
            "Variables added to the project file.",
            "Unable to add variables.",
            |project| {
                let doc = project.project_file_mut();
                ensure_variables_table(doc);
                for name in names {
                    let name = name.as_str();
                    match defaults.get(name) {
                        Some(default) if doc.get_table_like(&["variables", name]).is_some() => {
                            doc.set_value(&["variables", name, "default"], value(default.as_str()));
                        }
                        Some(default) => doc.set_value(&["variables", name], value(default.as_str())),
                        None if !declared.contains_key(name) => {
                            doc.set_value(&["variables", name], value(InlineTable::new()));
                        }
                        None => {}
                    }
                }
                Ok(())
            },
        )
    }

    /// Drop variable declarations along with any stored value.
    pub fn remove_variables(&self, project: &mut Project, names: &[String]) -> Result<Status> {
        let declared = declared_variables(project);
        let prefix = env_prefix(project).ok();
        let status = self.commit_validated_edit(
            project,
            "Variables removed from the project file.",
            "Unable to remove variables.",
            |project| {
                let doc = project.project_file_mut();
                if doc.get_array(&["variables"]).is_some() {
                    if let Some(array) = doc.array_mut(&["variables"]) {
                        filter_in_place(array, |v| !v.as_str().is_some_and(|n| names.iter().any(|r| r == n)));
                    }
                } else {
                    for name in names {
                        doc.unset_value(&["variables", name.as_str()]);
                    }
                }
                Ok(())
            },
        )?;
        if status.is_success() {
            let keychain = project.registry().keychain();
            let mut local_state = LocalState::open(project.directory())?;
            for name in names {
                let encrypted = declared.get(name).copied().unwrap_or(false);
                match &prefix {
                    Some(prefix) => forget_value(keychain, prefix, name, encrypted, &mut local_state)?,
                    None => {
                        local_state.unset_variable(name);
                    }
                }
            }
            local_state.save()?;
        }
        Ok(status)
    }

    /// Store values for declared variables: encrypted ones in the system
    /// keychain, the rest in the local state file.
    pub fn set_variables(&self, project: &mut Project, values: &[(String, String)]) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        let declared = declared_variables(project);
        let mut errors = Vec::new();
        for (name, _) in values {
            if !declared.contains_key(name) {
                let missing = with_suggestion(
                    Status::failure(format!("Variable {name} does not exist in the project.")),
                    name,
                    declared.keys().map(String::as_str),
                );
                errors.push(missing.description);
                errors.extend(missing.errors);
            }
        }
        if !errors.is_empty() {
            return Ok(Status::failure("Could not set variables.").with_errors(errors));
        }
        let prefix = match env_prefix(project) {
            Ok(prefix) => prefix,
            Err(failed) => return Ok(failed),
        };

        let keychain = project.registry().keychain();
        let mut local_state = LocalState::open(project.directory())?;
        let (mut local_count, mut keychain_count) = (0, 0);
        for (name, new_value) in values {
            if declared.get(name).copied().unwrap_or(false) {
                keychain.set(&prefix, name, new_value)?;
                keychain_count += 1;
            } else {
                local_state.set_variable(name, new_value);
                local_count += 1;
            }
        }
        local_state.save()?;

        let description = if keychain_count == 0 {
            format!("Values saved in {LOCAL_STATE_FILE_NAME}.")
        } else if local_count == 0 {
            "Values saved in the system keychain.".to_string()
        } else {
            format!(
                "{local_count} values saved in {LOCAL_STATE_FILE_NAME}, \
                 {keychain_count} values saved in the system keychain."
            )
        };
        Ok(Status::success(description))
    }

    /// Forget the stored values of `names`.
    pub fn unset_variables(&self, project: &mut Project, names: &[String]) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        let prefix = match env_prefix(project) {
            Ok(prefix) => prefix,
            Err(failed) => return Ok(failed),
        };
        let declared = declared_variables(project);
        let keychain = project.registry().keychain();
        let mut local_state = LocalState::open(project.directory())?;
        for name in names {
            let encrypted = declared.get(name).copied().unwrap_or(false);
            forget_value(keychain, &prefix, name, encrypted, &mut local_state)?;
        }
        local_state.save()?;
        Ok(Status::success("Variables were unset."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROJECT_FILE_NAME;
    use crate::prepare::RegistryPrepareEngine;
    use crate::test_utils::{FakeResolver, TestProject};

    fn engine() -> RegistryPrepareEngine {
        RegistryPrepareEngine::with_environ(BTreeMap::new())
    }

    #[test]
    fn test_add_variables_with_and_without_defaults() {
        let project = TestProject::new("name = \"demo\"\nvariables = [\"TOKEN\"]\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let mut defaults = BTreeMap::new();
        defaults.insert("PORT".to_string(), "8080".to_string());
        let status = coordinator
            .add_variables(&mut opened, &["PORT".to_string(), "TOKEN".to_string(), "HOST".to_string()], &defaults)
            .unwrap();
        assert!(status.is_success(), "{status}");

        let declared = declared_variables(&opened);
        assert_eq!(declared.keys().collect::<Vec<_>>(), ["HOST", "PORT", "TOKEN"]);
        let text = project.read(PROJECT_FILE_NAME);
        assert!(text.contains("PORT = \"8080\""));
    }

    #[test]
    fn test_duplicate_variable_is_refused() {
        let project =
            TestProject::new("name = \"demo\"\n\n[downloads]\nDATA = \"http://127.0.0.1:9/x\"\n").unwrap();
        let before = project.read(PROJECT_FILE_NAME);
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator.add_variables(&mut opened, &["DATA".to_string()], &BTreeMap::new()).unwrap();
        assert!(!status.is_success());
        assert_eq!(status.description, "Unable to add variables.");
        assert_eq!(project.read(PROJECT_FILE_NAME), before);
    }

    #[test]
    fn test_set_and_unset_values() {
        let project = TestProject::new("name = \"demo\"\n\n[variables]\nTOKEN = {}\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator
            .set_variables(&mut opened, &[("TOKNE".to_string(), "x".to_string())])
            .unwrap();
        assert!(!status.is_success());
        assert_eq!(status.errors, ["Variable TOKNE does not exist in the project.", "Did you mean: TOKEN?"]);

        let status = coordinator
            .set_variables(&mut opened, &[("TOKEN".to_string(), "secret".to_string())])
            .unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(LocalState::open(project.path()).unwrap().variable("TOKEN").as_deref(), Some("secret"));

        coordinator.unset_variables(&mut opened, &["TOKEN".to_string()]).unwrap();
        assert!(LocalState::open(project.path()).unwrap().variable("TOKEN").is_none());
    }

    #[test]
    fn test_remove_variables_clears_local_value() {
        let project = TestProject::new("name = \"demo\"\n\n[variables]\nTOKEN = {}\nKEEP = \"1\"\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);
        coordinator.set_variables(&mut opened, &[("TOKEN".to_string(), "secret".to_string())]).unwrap();

        let status = coordinator.remove_variables(&mut opened, &["TOKEN".to_string()]).unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(declared_variables(&opened).keys().collect::<Vec<_>>(), ["KEEP"]);
        assert!(LocalState::open(project.path()).unwrap().variable("TOKEN").is_none());
    }

    const SECRET_PROJECT: &str = "name = \"demo\"\n\n[variables]\nTOKEN = {}\nDB_PASSWORD = { encrypted = true }\n";

    fn prefix(project: &TestProject, opened: &Project) -> PathBuf {
        opened.env_spec(opened.default_env_spec_name()).unwrap().path(project.path())
    }

    #[test]
    fn test_encrypted_values_go_to_the_keychain() {
        let project = TestProject::new(SECRET_PROJECT).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);
        let prefix = prefix(&project, &opened);

        let status = coordinator
            .set_variables(&mut opened, &[("DB_PASSWORD".to_string(), "hunter2".to_string())])
            .unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(status.description, "Values saved in the system keychain.");
        assert_eq!(project.keychain().get(&prefix, "DB_PASSWORD").unwrap().as_deref(), Some("hunter2"));
        assert!(LocalState::open(project.path()).unwrap().variable("DB_PASSWORD").is_none());
        assert!(!project.read(LOCAL_STATE_FILE_NAME).contains("hunter2"));

        let status = coordinator
            .set_variables(
                &mut opened,
                &[
                    ("TOKEN".to_string(), "abc".to_string()),
                    ("DB_PASSWORD".to_string(), "swordfish".to_string()),
                ],
            )
            .unwrap();
        assert_eq!(
            status.description,
            "1 values saved in projkit-local.toml, 1 values saved in the system keychain."
        );
        assert_eq!(project.keychain().get(&prefix, "DB_PASSWORD").unwrap().as_deref(), Some("swordfish"));
        assert_eq!(LocalState::open(project.path()).unwrap().variable("TOKEN").as_deref(), Some("abc"));

        let status = coordinator.unset_variables(&mut opened, &["DB_PASSWORD".to_string()]).unwrap();
        assert!(status.is_success(), "{status}");
        assert!(project.keychain().is_empty());
        assert_eq!(LocalState::open(project.path()).unwrap().variable("TOKEN").as_deref(), Some("abc"));
    }

    #[test]
    fn test_remove_encrypted_variable_clears_keychain() {
        let project = TestProject::new(SECRET_PROJECT).unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);
        coordinator
            .set_variables(&mut opened, &[("DB_PASSWORD".to_string(), "hunter2".to_string())])
            .unwrap();
        assert_eq!(project.keychain().len(), 1);

        let status = coordinator.remove_variables(&mut opened, &["DB_PASSWORD".to_string()]).unwrap();
        assert!(status.is_success(), "{status}");
        assert!(project.keychain().is_empty());
        assert_eq!(declared_variables(&opened).keys().collect::<Vec<_>>(), ["TOKEN"]);
    }
}
