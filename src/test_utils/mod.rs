//! Test utilities for projkit
//!
//! Helpers shared by unit tests and the integration suite:
//!
//! - [`TestProject`] - a project directory in a temp dir with files written up front
//! - [`FakeResolver`] - a [`DependencyResolver`] that pins every package to a
//!   configurable version and records its calls
//! - [`RecordingBuilder`] - an [`EnvironmentBuilder`] that creates empty
//!   prefixes and records what it was asked to do
//! - [`FakeEngine`] - a prepare engine that succeeds unless told otherwise
//! - [`MemoryKeychain`] - a [`Keychain`](crate::requirements::Keychain) that
//!   never touches the system credential store
//!
//! # Example
//!
//! ```rust,no_run
//! use projkit_cli::test_utils::{FakeResolver, TestProject};
//!
//! let project = TestProject::new("name = \"demo\"\n").unwrap();
//! let resolver = FakeResolver::new().with_version("numpy", "1.26.0");
//! let mut opened = project.open().unwrap();
//! ```

pub mod fakes;

pub use fakes::{FakeEngine, FakeResolver, MemoryKeychain, RecordingBuilder};

use crate::constants::{LOCK_FILE_NAME, PROJECT_FILE_NAME};
use crate::project::Project;
use crate::requirements::{Keychain, RequirementRegistry};
use crate::resolver::EnvironmentBuilder;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, tests stay quiet.
///
/// ```bash
/// RUST_LOG=projkit_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// A project directory inside a temp dir.
pub struct TestProject {
    temp_dir: TempDir,
    builder: Option<Arc<dyn EnvironmentBuilder>>,
    keychain: Arc<MemoryKeychain>,
}

impl TestProject {
    /// A project whose `projkit.toml` holds `content`.
    pub fn new(content: &str) -> Result<Self> {
        let project = Self::empty()?;
        project.write(PROJECT_FILE_NAME, content)?;
        Ok(project)
    }

    /// A directory with no project files in it.
    pub fn empty() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            builder: None,
            keychain: Arc::new(MemoryKeychain::new()),
        })
    }

    /// Also write `projkit.lock`.
    pub fn with_lock(self, content: &str) -> Result<Self> {
        self.write(LOCK_FILE_NAME, content)?;
        Ok(self)
    }

    /// Build environments through `builder` in projects opened from here.
    pub fn with_builder(mut self, builder: Arc<dyn EnvironmentBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Contents of a file, empty when it does not exist.
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.join(relative)).unwrap_or_default()
    }

    /// The keychain every project opened from here stores secrets in.
    pub fn keychain(&self) -> &MemoryKeychain {
        &self.keychain
    }

    pub fn registry(&self) -> Arc<RequirementRegistry> {
        Arc::new(
            RequirementRegistry::new(self.builder.clone(), Duration::from_secs(5))
                .with_keychain(Arc::clone(&self.keychain) as Arc<dyn Keychain>),
        )
    }

    pub fn open(&self) -> Result<Project> {
        Project::open(self.path(), self.registry())
    }
}
