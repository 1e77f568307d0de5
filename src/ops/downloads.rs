//! Download requirement operations.

use super::with_suggestion;
use crate::core::Status;
use crate::prepare::PrepareResult;
use crate::project::Project;
use crate::requirements::{HashAlgorithm, ProvideTarget, Requirement};
use crate::transaction::Coordinator;
use anyhow::Result;
use toml_edit::{InlineTable, value};

impl Coordinator<'_> {
    /// Declare (or redefine) download `env_var`, fetch it, and save the
    /// project only if that worked.
    ///
    /// `filename` defaults to the last segment of the URL. A `hash` replaces
    /// any checksum recorded before.
    pub fn add_download(
        &self,
        project: &mut Project,
        env_var: &str,
        url: &str,
        filename: Option<&str>,
        hash: Option<(HashAlgorithm, String)>,
    ) -> Result<Status> {
        let target = ProvideTarget::Variable(env_var.to_string());
        self.with_staged_edit(project, target, None, |project| {
            let doc = project.project_file_mut();
            if doc.get_table_like(&["downloads", env_var]).is_none() {
                doc.set_value(&["downloads", env_var], value(InlineTable::new()));
            }
            doc.set_value(&["downloads", env_var, "url"], value(url));
            if let Some(filename) = filename {
                doc.set_value(&["downloads", env_var, "filename"], value(filename));
            }
            if let Some((algorithm, digest)) = &hash {
                for other in HashAlgorithm::ALL {
                    doc.unset_value(&["downloads", env_var, other.key()]);
                }
                doc.set_value(&["downloads", env_var, algorithm.key()], value(digest.as_str()));
            }
            Ok(())
        })
    }

    /// Delete the downloaded file of `env_var` and drop the requirement.
    pub fn remove_download(
        &self,
        project: &mut Project,
        prepare_result: &PrepareResult,
        env_var: &str,
    ) -> Result<Status> {
        if let Some(problems) = project.problems_status(None) {
            return Ok(problems);
        }
        let target = ProvideTarget::Variable(env_var.to_string());
        if !matches!(project.find_requirement(&target), Some(Requirement::Download { .. })) {
            let downloads = project.requirements().iter().filter_map(|r| match r {
                Requirement::Download {
                    env_var,
                    ..
                } => Some(env_var.as_str()),
                _ => None,
            });
            return Ok(with_suggestion(
                Status::failure(format!("Download requirement: {env_var} not found.")),
                env_var,
                downloads,
            ));
        }

        let cleaned = self.engine().unprepare(project, prepare_result, Some(&[target]));
        if !cleaned.is_success() {
            return Ok(cleaned);
        }
        let status = self.commit_validated_edit(
            project,
            format!("Removed download {env_var} from the project file."),
            "Unable to remove the download.",
            |project| {
                project.project_file_mut().unset_value(&["downloads", env_var]);
                Ok(())
            },
        )?;
        Ok(status.prepend_logs(cleaned.logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROJECT_FILE_NAME;
    use crate::prepare::RegistryPrepareEngine;
    use crate::test_utils::{FakeResolver, TestProject};
    use std::collections::BTreeMap;

    fn engine() -> RegistryPrepareEngine {
        RegistryPrepareEngine::with_environ(BTreeMap::new())
    }

    #[test]
    fn test_add_download_keeps_file_already_there() {
        let project = TestProject::new("name = \"demo\"\n").unwrap();
        project.write("data.csv", "a,b\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator
            .add_download(&mut opened, "DATA", "http://127.0.0.1:9/data.csv", None, None)
            .unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(status.description, "File data.csv was already downloaded.");
        assert!(project.read(PROJECT_FILE_NAME).contains("http://127.0.0.1:9/data.csv"));
    }

    #[test]
    fn test_failed_download_changes_nothing() {
        let project = TestProject::new("name = \"demo\"\n").unwrap();
        let before = project.read(PROJECT_FILE_NAME);
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let status = coordinator
            .add_download(&mut opened, "DATA", "http://127.0.0.1:9/missing.csv", None, None)
            .unwrap();
        assert!(!status.is_success());
        assert_eq!(project.read(PROJECT_FILE_NAME), before);
        assert!(opened.find_requirement(&ProvideTarget::Variable("DATA".to_string())).is_none());
    }

    #[test]
    fn test_new_hash_replaces_old_one() {
        let project = TestProject::new(
            "name = \"demo\"\n\n[downloads]\nDATA = { url = \"http://127.0.0.1:9/data.csv\", sha256 = \"00\" }\n",
        )
        .unwrap();
        project.write("data.csv", "").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        // sha512 of the empty file
        let digest = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";
        let status = coordinator
            .add_download(
                &mut opened,
                "DATA",
                "http://127.0.0.1:9/data.csv",
                None,
                Some((HashAlgorithm::Sha512, digest.to_string())),
            )
            .unwrap();
        assert!(status.is_success(), "{status}");
        let text = project.read(PROJECT_FILE_NAME);
        assert!(!text.contains("sha256"));
        assert!(text.contains(digest));
    }

    #[test]
    fn test_remove_download() {
        let project = TestProject::new(
            "name = \"demo\"\n\n[downloads]\nDATA = \"http://127.0.0.1:9/data.csv\"\n",
        )
        .unwrap();
        project.write("data.csv", "a,b\n").unwrap();
        let mut opened = project.open().unwrap();
        let (resolver, engine) = (FakeResolver::new(), engine());
        let coordinator = Coordinator::new(&resolver, &engine);

        let previous = PrepareResult::unprepared(&opened, None);
        let status = coordinator.remove_download(&mut opened, &previous, "DAAT").unwrap();
        assert_eq!(status.description, "Download requirement: DAAT not found.");

        let previous = PrepareResult::unprepared(&opened, None);
        let status = coordinator.remove_download(&mut opened, &previous, "DATA").unwrap();
        assert!(status.is_success(), "{status}");
        assert!(!project.join("data.csv").exists());
        assert!(!project.read(PROJECT_FILE_NAME).contains("DATA"));
    }
}
