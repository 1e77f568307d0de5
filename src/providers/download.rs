//! The download provider.
//!
//! Files are fetched into a temporary file beside their destination, checked
//! against the declared digest, and only then moved into place. A file that
//! is already present and matches its digest is not fetched again.

use super::wrong_kind;
use crate::core::{ProjkitError, Status};
use crate::requirements::{HashAlgorithm, ProvideContext, Provider, Requirement};
use sha2::digest::DynDigest;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Hex digest of the file at `path`.
pub fn digest_file(path: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let mut hasher: Box<dyn DynDigest> = match algorithm {
        HashAlgorithm::Sha224 => Box::new(Sha224::default()),
        HashAlgorithm::Sha256 => Box::new(Sha256::default()),
        HashAlgorithm::Sha384 => Box::new(Sha384::default()),
        HashAlgorithm::Sha512 => Box::new(Sha512::default()),
    };
    let mut reader = BufReader::new(File::open(path)?);
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn verify(path: &Path, hash: Option<&(HashAlgorithm, String)>) -> Result<(), ProjkitError> {
    let Some((algorithm, expected)) = hash else {
        return Ok(());
    };
    let actual = digest_file(path, *algorithm)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(ProjkitError::ChecksumMismatch {
            path: path.display().to_string(),
            expected: expected.clone(),
            actual,
        })
    }
}

/// Provides download requirements.
#[derive(Debug, Clone)]
pub struct DownloadProvider {
    timeout: Duration,
}

impl DownloadProvider {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
        }
    }

    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        hash: Option<&(HashAlgorithm, String)>,
    ) -> Result<(), ProjkitError> {
        let failed = |reason: String| ProjkitError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| failed(e.to_string()))?;
        let mut response = client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| failed(e.to_string()))?;

        let directory = destination.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)?;
        let mut temp = NamedTempFile::new_in(directory)?;
        response.copy_to(temp.as_file_mut()).map_err(|e| failed(e.to_string()))?;

        verify(temp.path(), hash)?;
        temp.persist(destination).map_err(|e| ProjkitError::IoError(e.error))?;
        Ok(())
    }
}

impl Provider for DownloadProvider {
    fn provide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status {
        let Requirement::Download {
            env_var,
            url,
            filename,
            hash,
            ..
        } = requirement
        else {
            return wrong_kind("download", requirement);
        };

        let destination = context.project_dir.join(filename);
        let mut logs = Vec::new();
        if destination.is_file() {
            match verify(&destination, hash.as_ref()) {
                Ok(()) => {
                    debug!(file = %destination.display(), "Download already present");
                    context.environ.insert(env_var.clone(), destination.display().to_string());
                    return Status::success(format!("File {filename} was already downloaded."));
                }
                Err(e) => {
                    logs.push(format!("Existing {filename} is not valid ({e}); downloading again."));
                }
            }
        }

        info!(url = %url, file = %destination.display(), "Downloading");
        logs.push(format!("Downloading {url}..."));
        match self.fetch(url, &destination, hash.as_ref()) {
            Ok(()) => {
                context.environ.insert(env_var.clone(), destination.display().to_string());
                Status::success(format!("Downloaded {url} to {filename}.")).with_logs(logs)
            }
            Err(e) => Status::failure(format!("Failed to download {url}."))
                .with_logs(logs)
                .with_error(e.to_string()),
        }
    }

    fn unprovide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status {
        let Requirement::Download {
            filename,
            ..
        } = requirement
        else {
            return wrong_kind("download", requirement);
        };

        let path = context.project_dir.join(filename);
        if !path.exists() {
            return Status::success(format!("Nothing to clean up for {filename}."));
        }
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match removed {
            Ok(()) => Status::success(format!("Removed downloaded file {filename}.")),
            Err(e) => Status::failure(format!("Failed to remove {filename}: {e}.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::LocalState;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    fn requirement(hash: Option<(HashAlgorithm, String)>) -> Requirement {
        Requirement::Download {
            env_var: "DATA".to_string(),
            // unroutable, so a test that reaches the network fails fast
            url: "http://127.0.0.1:9/data.txt".to_string(),
            filename: "data.txt".to_string(),
            hash,
            description: None,
        }
    }

    #[test]
    fn test_digest_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(digest_file(&path, HashAlgorithm::Sha256).unwrap(), HELLO_SHA256);
        assert_eq!(digest_file(&path, HashAlgorithm::Sha512).unwrap().len(), 128);
    }

    #[test]
    fn test_existing_valid_file_is_reused() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.txt"), "hello").unwrap();
        let mut environ = BTreeMap::new();
        let mut local_state = LocalState::open(dir.path()).unwrap();
        let mut context = ProvideContext {
            project_dir: dir.path(),
            env_spec: None,
            environ: &mut environ,
            local_state: &mut local_state,
        };

        let provider = DownloadProvider::new(Duration::from_secs(1));
        let hash = Some((HashAlgorithm::Sha256, HELLO_SHA256.to_uppercase()));
        let status = provider.provide(&requirement(hash), &mut context);
        assert!(status.is_success(), "{status}");
        assert!(environ["DATA"].ends_with("data.txt"));
    }

    #[test]
    fn test_unreachable_url_fails_without_leaving_files() {
        let dir = TempDir::new().unwrap();
        let mut environ = BTreeMap::new();
        let mut local_state = LocalState::open(dir.path()).unwrap();
        let mut context = ProvideContext {
            project_dir: dir.path(),
            env_spec: None,
            environ: &mut environ,
            local_state: &mut local_state,
        };

        let provider = DownloadProvider::new(Duration::from_secs(1));
        let status = provider.provide(&requirement(None), &mut context);
        assert!(!status.is_success());
        assert_eq!(status.errors.len(), 1);
        assert!(environ.is_empty());
        assert!(!dir.path().join("data.txt").exists());
    }

    #[test]
    fn test_unprovide_removes_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.txt"), "hello").unwrap();
        let mut environ = BTreeMap::new();
        let mut local_state = LocalState::open(dir.path()).unwrap();
        let mut context = ProvideContext {
            project_dir: dir.path(),
            env_spec: None,
            environ: &mut environ,
            local_state: &mut local_state,
        };

        let provider = DownloadProvider::new(Duration::from_secs(1));
        assert!(provider.unprovide(&requirement(None), &mut context).is_success());
        assert!(!dir.path().join("data.txt").exists());
    }
}
