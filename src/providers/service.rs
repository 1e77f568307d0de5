//! The service provider.
//!
//! The only service type is redis. A service variable that is already set in
//! the environment or in local state is used as is; otherwise a private
//! `redis-server` is started under `services/<VAR>` and its run state is
//! remembered in local state so a later prepare reuses it and unprepare can
//! stop it.

use super::wrong_kind;
use crate::constants::SERVICES_DIR;
use crate::core::Status;
use crate::requirements::{ProvideContext, Provider, Requirement};
use crate::utils::fs::{ensure_dir, remove_dir_all};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;
use toml_edit::{Item, Table, value};
use tracing::{debug, info, warn};

const REDIS_SERVER: &str = "redis-server";
const REDIS_CLI: &str = "redis-cli";
const PIDFILE_NAME: &str = "redis.pid";

/// Provides service requirements.
#[derive(Debug, Clone, Default)]
pub struct ServiceProvider;

impl ServiceProvider {
    pub fn new() -> Self {
        Self
    }
}

fn service_dir(project_dir: &Path, env_var: &str) -> PathBuf {
    project_dir.join(SERVICES_DIR).join(env_var)
}

fn redis_url(port: u16) -> String {
    format!("redis://localhost:{port}")
}

/// A port nothing listens on right now.
fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

/// Port of a server this machine started and that still has its pidfile.
fn running_port(context: &ProvideContext<'_>, env_var: &str) -> Option<u16> {
    let state = context.local_state.service_run_state(env_var)?;
    let port = state.get("port").and_then(Item::as_integer)?;
    let pidfile = state.get("pidfile").and_then(Item::as_str)?;
    if Path::new(pidfile).is_file() {
        u16::try_from(port).ok()
    } else {
        None
    }
}

fn start_redis(dir: &Path, port: u16) -> Result<PathBuf, String> {
    let program = which::which(REDIS_SERVER)
        .map_err(|_| format!("Could not find {REDIS_SERVER} on the PATH."))?;
    ensure_dir(dir).map_err(|e| format!("{e:#}"))?;
    let pidfile = dir.join(PIDFILE_NAME);

    let output = Command::new(&program)
        .arg("--port")
        .arg(port.to_string())
        .arg("--daemonize")
        .arg("yes")
        .arg("--pidfile")
        .arg(&pidfile)
        .arg("--logfile")
        .arg(dir.join("redis.log"))
        .arg("--dir")
        .arg(dir)
        .output()
        .map_err(|e| format!("Failed to run {}: {e}", program.display()))?;

    if output.status.success() {
        Ok(pidfile)
    } else {
        Err(format!(
            "{REDIS_SERVER} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

impl Provider for ServiceProvider {
    fn provide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status {
        let Requirement::Service {
            env_var,
            service_type,
        } = requirement
        else {
            return wrong_kind("service", requirement);
        };
        if service_type != "redis" {
            return Status::failure(format!("Unknown service type '{service_type}'."));
        }

        if context.environ.contains_key(env_var) {
            return Status::success(format!("Using {env_var} from the environment."));
        }
        if let Some(url) = context.local_state.variable(env_var) {
            context.environ.insert(env_var.clone(), url);
            return Status::success(format!("Using the configured value of {env_var}."));
        }
        if let Some(port) = running_port(context, env_var) {
            debug!(env_var = %env_var, port, "Reusing running redis");
            context.environ.insert(env_var.clone(), redis_url(port));
            return Status::success(format!("Using redis server already running on port {port}."));
        }

        let port = match free_port() {
            Ok(port) => port,
            Err(e) => return Status::failure(format!("Could not find a free port for redis: {e}.")),
        };
        let dir = service_dir(context.project_dir, env_var);
        info!(env_var = %env_var, port, "Starting redis");
        let pidfile = match start_redis(&dir, port) {
            Ok(pidfile) => pidfile,
            Err(e) => {
                return Status::failure(format!("Could not start a redis server for {env_var}."))
                    .with_error(e)
                    .with_error(format!(
                        "Install redis, or set {env_var} to the URL of a running server."
                    ));
            }
        };

        let mut state = Table::new();
        state.insert("port", value(i64::from(port)));
        state.insert("pidfile", value(pidfile.display().to_string()));
        context.local_state.set_service_run_state(env_var, state);
        if let Err(e) = context.local_state.save() {
            warn!(error = %e, "Could not record the redis run state");
        }

        context.environ.insert(env_var.clone(), redis_url(port));
        Status::success(format!("Started redis server on port {port}."))
    }

    fn unprovide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status {
        let Requirement::Service {
            env_var,
            ..
        } = requirement
        else {
            return wrong_kind("service", requirement);
        };

        let port = context
            .local_state
            .service_run_state(env_var)
            .and_then(|state| state.get("port"))
            .and_then(Item::as_integer);
        let dir = service_dir(context.project_dir, env_var);

        let mut logs = Vec::new();
        if let Some(port) = port {
            match which::which(REDIS_CLI) {
                Ok(cli) => {
                    let stopped = Command::new(cli)
                        .arg("-p")
                        .arg(port.to_string())
                        .arg("shutdown")
                        .output()
                        .is_ok_and(|output| output.status.success());
                    if !stopped {
                        logs.push(format!("redis on port {port} did not answer the shutdown request."));
                    }
                }
                Err(_) => logs.push(format!("{REDIS_CLI} not found; redis on port {port} was left running.")),
            }
            context.local_state.clear_service_run_state(env_var);
            if let Err(e) = context.local_state.save() {
                warn!(error = %e, "Could not clear the redis run state");
            }
        }

        if let Err(e) = remove_dir_all(&dir) {
            return Status::failure(format!("Failed to remove {}.", dir.display()))
                .with_logs(logs)
                .with_error(format!("{e:#}"));
        }
        match port {
            Some(port) => Status::success(format!("Stopped redis server on port {port}.")).with_logs(logs),
            None => Status::success(format!("No redis server was started for {env_var}.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::LocalState;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn requirement() -> Requirement {
        Requirement::Service {
            env_var: "REDIS_URL".to_string(),
            service_type: "redis".to_string(),
        }
    }

    #[test]
    fn test_environment_value_wins() {
        let dir = TempDir::new().unwrap();
        let mut environ =
            BTreeMap::from([("REDIS_URL".to_string(), "redis://cache:6379".to_string())]);
        let mut local_state = LocalState::open(dir.path()).unwrap();
        let mut context = ProvideContext {
            project_dir: dir.path(),
            env_spec: None,
            environ: &mut environ,
            local_state: &mut local_state,
        };
        assert!(ServiceProvider::new().provide(&requirement(), &mut context).is_success());
        assert_eq!(environ["REDIS_URL"], "redis://cache:6379");
    }

    #[test]
    fn test_local_state_value_is_used() {
        let dir = TempDir::new().unwrap();
        let mut environ = BTreeMap::new();
        let mut local_state = LocalState::open(dir.path()).unwrap();
        local_state.set_variable("REDIS_URL", "redis://localhost:7000");
        let mut context = ProvideContext {
            project_dir: dir.path(),
            env_spec: None,
            environ: &mut environ,
            local_state: &mut local_state,
        };
        assert!(ServiceProvider::new().provide(&requirement(), &mut context).is_success());
        assert_eq!(environ["REDIS_URL"], "redis://localhost:7000");
    }

    #[test]
    fn test_unprovide_without_run_state() {
        let dir = TempDir::new().unwrap();
        let mut environ = BTreeMap::new();
        let mut local_state = LocalState::open(dir.path()).unwrap();
        let mut context = ProvideContext {
            project_dir: dir.path(),
            env_spec: None,
            environ: &mut environ,
            local_state: &mut local_state,
        };
        let status = ServiceProvider::new().unprovide(&requirement(), &mut context);
        assert!(status.is_success());
        assert!(status.description.starts_with("No redis server"));
    }
}
