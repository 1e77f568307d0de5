//! Resolver and builder backed by an external command.
//!
//! The command is configured as a list (`["projkit-conda-bridge", "--quiet"]`)
//! and invoked with one extra argument naming the operation:
//!
//! | operation | stdin                                          | stdout                              |
//! |-----------|------------------------------------------------|-------------------------------------|
//! | `resolve` | `{packages, channels, platforms}`              | `{"packages": {platform: [record]}}` |
//! | `build`   | `{prefix, packages, pip, channels, platform, locked}` | `{"logs": [line]}` (optional) |
//! | `remove`  | `{prefix, packages}`                           | ignored                             |
//!
//! A non-zero exit status is reported with the command's stderr.

use super::{BuildRequest, DependencyResolver, EnvironmentBuilder};
use crate::core::ProjkitError;
use crate::lockfile::LockSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// A configured command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    program: String,
    args: Vec<String>,
}

impl ExternalTool {
    /// Build from a command list; `None` when the list is empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp, ProjkitError>
    where
        Req: Serialize,
        Resp: DeserializeOwned + Default,
    {
        let stdout = self.execute(operation, request)?;
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Resp::default());
        }
        serde_json::from_slice(&stdout).map_err(|e| ProjkitError::ExternalCommandInvalidOutput {
            program: self.program.clone(),
            reason: e.to_string(),
        })
    }

    fn execute<Req>(&self, operation: &str, request: &Req) -> Result<Vec<u8>, ProjkitError>
    where
        Req: Serialize,
    {
        let input = serde_json::to_vec(request).map_err(|e| ProjkitError::Other {
            message: format!("Failed to encode {operation} request: {e}"),
        })?;

        debug!(program = %self.program, operation, "Running external tool");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(operation)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failed(operation, format!("could not start: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).map_err(|e| self.failed(operation, e.to_string()))?;
        }

        let output = child.wait_with_output().map_err(|e| self.failed(operation, e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(program = %self.program, code = ?output.status.code(), "External tool failed");
            let stderr = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(self.failed(operation, stderr));
        }
        Ok(output.stdout)
    }

    fn failed(&self, operation: &str, stderr: String) -> ProjkitError {
        ProjkitError::ExternalCommandFailed {
            program: self.program.clone(),
            operation: operation.to_string(),
            stderr,
        }
    }
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
    packages: &'a [String],
    channels: &'a [String],
    platforms: &'a [String],
}

#[derive(Deserialize, Default)]
struct ResolveResponse {
    #[serde(default)]
    packages: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
struct BuildRequestBody<'a> {
    prefix: &'a Path,
    packages: &'a [String],
    pip: &'a [String],
    channels: &'a [String],
    platform: &'a str,
    locked: Option<&'a [String]>,
}

#[derive(Deserialize, Default)]
struct BuildResponse {
    #[serde(default)]
    logs: Vec<String>,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefix: &'a Path,
    packages: &'a [String],
}

/// [`DependencyResolver`] running `<command> resolve`.
#[derive(Debug, Clone)]
pub struct ExternalResolver {
    tool: ExternalTool,
}

impl ExternalResolver {
    pub fn new(tool: ExternalTool) -> Self {
        Self {
            tool,
        }
    }
}

impl DependencyResolver for ExternalResolver {
    fn resolve(
        &self,
        packages: &[String],
        channels: &[String],
        platforms: &[String],
    ) -> Result<LockSet, ProjkitError> {
        let response: ResolveResponse = self.tool.run(
            "resolve",
            &ResolveRequest {
                packages,
                channels,
                platforms,
            },
        )?;

        if let Some(platform) = platforms.iter().find(|p| !response.packages.contains_key(*p)) {
            return Err(ProjkitError::ExternalCommandInvalidOutput {
                program: self.tool.program().to_string(),
                reason: format!("no packages returned for platform {platform}"),
            });
        }
        Ok(LockSet::new(platforms.iter().cloned(), response.packages))
    }
}

/// [`EnvironmentBuilder`] running `<command> build` and `<command> remove`.
#[derive(Debug, Clone)]
pub struct ExternalBuilder {
    tool: ExternalTool,
}

impl ExternalBuilder {
    pub fn new(tool: ExternalTool) -> Self {
        Self {
            tool,
        }
    }
}

impl EnvironmentBuilder for ExternalBuilder {
    fn build(&self, request: &BuildRequest<'_>) -> Result<Vec<String>, ProjkitError> {
        let body = BuildRequestBody {
            prefix: request.prefix,
            packages: &request.env_spec.conda_packages,
            pip: &request.env_spec.pip_packages,
            channels: &request.env_spec.channels,
            platform: request.platform,
            locked: request.locked,
        };
        let response: BuildResponse = self.tool.run("build", &body)?;
        Ok(response.logs)
    }

    fn remove_packages(&self, prefix: &Path, packages: &[String]) -> Result<(), ProjkitError> {
        self.tool.execute(
            "remove",
            &RemoveRequest {
                prefix,
                packages,
            },
        )?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> ExternalTool {
        ExternalTool::from_command(&["sh".to_string(), "-c".to_string(), script.to_string()])
            .unwrap()
    }

    #[test]
    fn test_from_empty_command() {
        assert!(ExternalTool::from_command(&[]).is_none());
    }

    #[test]
    fn test_resolve_reads_json() {
        // `sh -c script resolve`: the operation lands in $0
        let tool = shell(
            r#"cat >/dev/null; echo '{"packages": {"linux-64": ["numpy=1.26.0=0"]}}'"#,
        );
        let lock_set = ExternalResolver::new(tool)
            .resolve(&["numpy".to_string()], &[], &["linux-64".to_string()])
            .unwrap();
        assert_eq!(lock_set.records_for("linux-64"), ["numpy=1.26.0=0".to_string()]);
        assert!(lock_set.enabled());
    }

    #[test]
    fn test_resolve_failure_carries_stderr() {
        let tool = shell("cat >/dev/null; echo 'PackagesNotFoundError: nump' >&2; exit 1");
        let err = ExternalResolver::new(tool)
            .resolve(&["nump".to_string()], &[], &["linux-64".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("PackagesNotFoundError: nump"));
    }

    #[test]
    fn test_resolve_missing_platform_is_invalid() {
        let tool = shell(r#"cat >/dev/null; echo '{"packages": {}}'"#);
        let err = ExternalResolver::new(tool)
            .resolve(&["numpy".to_string()], &[], &["osx-64".to_string()])
            .unwrap_err();
        assert!(matches!(err, ProjkitError::ExternalCommandInvalidOutput { .. }));
    }

    #[test]
    fn test_remove_ignores_output() {
        let tool = shell("cat >/dev/null; echo 'Removed 0 packages'");
        ExternalBuilder::new(tool).remove_packages(Path::new("/tmp/env"), &[]).unwrap();
    }
}
