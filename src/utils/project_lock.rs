//! The per-project transaction lock.
//!
//! Only one transaction may run against a project at a time. The CLI takes
//! this lock before opening the project and holds it until the operation's
//! documents are saved or reverted. The holder writes its process id into the
//! lock file so a process that gives up waiting can say who it waited for.
//!
//! File operations run on `spawn_blocking` so waiting for another process
//! never blocks the tokio runtime.

use crate::constants::{
    MAX_BACKOFF_DELAY_MS, PROJECT_LOCK_FILE_NAME, STARTING_BACKOFF_DELAY_MS, STATE_DIR,
};
use crate::core::ProjkitError;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

/// Exclusive hold on a project's `.projkit/transaction.lock`.
///
/// Released, and the lock file removed, when dropped.
///
/// # Example
///
/// ```rust,no_run
/// use projkit_cli::utils::project_lock::ProjectLock;
/// use std::path::Path;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let _lock = ProjectLock::acquire(Path::new("/path/to/project"), Duration::from_secs(120)).await?;
/// // load, edit, save...
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProjectLock {
    /// Lock is released when this is dropped
    _file: Arc<File>,
    path: PathBuf,
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Project lock released");
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %self.path.display(), error = %e, "Failed to remove lock file");
        }
    }
}

impl ProjectLock {
    /// Where the lock file of the project in `project_dir` lives.
    pub fn path_for(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join(PROJECT_LOCK_FILE_NAME)
    }

    /// Process id recorded by the current holder, if it can be read.
    pub fn holder(project_dir: &Path) -> Option<u32> {
        std::fs::read_to_string(Self::path_for(project_dir)).ok()?.trim().parse().ok()
    }

    /// Take the lock, waiting up to `timeout` for another process to let go.
    ///
    /// Uses non-blocking `try_lock_exclusive()` attempts with exponential
    /// backoff (10ms, 20ms, 40ms... capped at 500ms).
    ///
    /// # Errors
    ///
    /// Returns [`ProjkitError::ProjectLockTimeout`] when the lock is still
    /// held after `timeout`, or an I/O error when the lock file cannot be
    /// created.
    pub async fn acquire(project_dir: &Path, timeout: Duration) -> Result<Self> {
        let path = Self::path_for(project_dir);
        debug!(path = %path.display(), "Waiting for project lock");

        let state_dir = project_dir.join(STATE_DIR);
        tokio::fs::create_dir_all(&state_dir)
            .await
            .with_context(|| format!("Failed to create {}", state_dir.display()))?;

        let open_path = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .context("spawn_blocking panicked")?
        .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        let file = Arc::new(file);
        let start = Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let attempt = Arc::clone(&file);
            let acquired = tokio::task::spawn_blocking(move || try_take(&attempt))
                .await
                .context("spawn_blocking panicked")?;

            if acquired {
                debug!(wait_ms = start.elapsed().as_millis(), "Project lock acquired");
                return Ok(Self {
                    _file: file,
                    path,
                });
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(ProjkitError::ProjectLockTimeout {
            project: project_dir.display().to_string(),
            holder: Self::holder(project_dir),
            timeout,
        }
        .into())
    }
}

/// Try once to lock `file`; on success, record this process as the holder.
fn try_take(file: &File) -> bool {
    match file.try_lock_exclusive() {
        Ok(true) => {
            if let Err(e) = record_holder(file) {
                debug!(error = %e, "Could not record lock holder");
            }
            true
        }
        Ok(false) | Err(_) => false,
    }
}

fn record_holder(mut file: &File) -> std::io::Result<()> {
    file.set_len(0)?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_file_records_holder_and_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let project_dir = temp_dir.path();

        let lock = ProjectLock::acquire(project_dir, Duration::from_secs(5)).await.unwrap();
        let path = project_dir.join(".projkit").join("transaction.lock");
        assert!(path.exists());
        #[cfg(unix)]
        assert_eq!(ProjectLock::holder(project_dir), Some(std::process::id()));

        drop(lock);
        assert!(!path.exists());
        assert_eq!(ProjectLock::holder(project_dir), None);
    }

    #[tokio::test]
    async fn test_second_transaction_waits_for_the_first() {
        use tokio::sync::Barrier;

        let temp_dir = TempDir::new().unwrap();
        let project_dir = Arc::new(temp_dir.path().to_path_buf());
        let barrier = Arc::new(Barrier::new(2));

        let first_dir = Arc::clone(&project_dir);
        let first_barrier = Arc::clone(&barrier);
        let first = tokio::spawn(async move {
            let _lock = ProjectLock::acquire(&first_dir, Duration::from_secs(5)).await.unwrap();
            first_barrier.wait().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let second_dir = Arc::clone(&project_dir);
        let second = tokio::spawn(async move {
            barrier.wait().await;
            let start = Instant::now();
            let _lock = ProjectLock::acquire(&second_dir, Duration::from_secs(5)).await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(50));
        });

        first.await.unwrap();
        second.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_names_project_and_holder() {
        let temp_dir = TempDir::new().unwrap();
        let project_dir = temp_dir.path();
        let _held = ProjectLock::acquire(project_dir, Duration::from_secs(5)).await.unwrap();

        let error = ProjectLock::acquire(project_dir, Duration::from_millis(100)).await.unwrap_err();
        match error.downcast_ref::<ProjkitError>() {
            Some(ProjkitError::ProjectLockTimeout {
                project,
                holder,
                timeout,
            }) => {
                assert_eq!(project, &project_dir.display().to_string());
                assert_eq!(*timeout, Duration::from_millis(100));
                #[cfg(unix)]
                assert_eq!(*holder, Some(std::process::id()));
                #[cfg(not(unix))]
                let _ = holder;
            }
            other => panic!("Expected ProjectLockTimeout, got {other:?}"),
        }
    }
}
