//! Global configuration file handling.

use crate::constants::{CONFIG_PATH_VAR, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_LOCK_TIMEOUT_SECS};
use crate::core::ProjkitError;
use crate::requirements::RequirementRegistry;
use crate::resolver::external::ExternalTool;
use crate::resolver::{
    DependencyResolver, EnvironmentBuilder, ExternalBuilder, ExternalResolver, UnconfiguredResolver,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// External commands projkit delegates to.
///
/// Each is a program followed by leading arguments; projkit appends the
/// subcommand (`resolve`, `build`, `remove`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ToolSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolver: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub builder: Vec<String>,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Per-download timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_lock_timeout_secs() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionSettings {
    /// How long a command waits for another one working on the same project
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

/// The user's global configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use projkit_cli::config::GlobalConfig;
///
/// let config: GlobalConfig = toml::from_str(r#"
/// [tools]
/// resolver = ["projkit-conda-bridge", "--offline"]
/// "#).unwrap();
/// assert!(config.resolver().is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub downloads: DownloadSettings,

    #[serde(default)]
    pub transactions: TransactionSettings,
}

impl GlobalConfig {
    /// Load from `path`, or from [`GlobalConfig::default_path`] when `None`.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// The file exists but cannot be read or is not valid TOML for this schema.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!(path = %path.display(), "No global config, using defaults");
            Ok(Self::default())
        }
    }

    /// Load global configuration from a specific file path.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read global config from {}", path.display()))?;

        let config = toml::from_str(&content)
            .map_err(ProjkitError::from)
            .with_context(|| format!("Failed to parse global config from {}", path.display()))?;
        Ok(config)
    }

    /// Where the global configuration lives.
    ///
    /// `PROJKIT_CONFIG` wins; otherwise `~/.projkit/config.toml`
    /// (`%LOCALAPPDATA%\projkit\config.toml` on Windows).
    ///
    /// # Errors
    ///
    /// The home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("projkit")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".projkit")
        };

        Ok(config_dir.join("config.toml"))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.downloads.timeout_secs)
    }

    /// How long to wait for the project lock.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.transactions.lock_timeout_secs)
    }

    /// The configured resolver, if any.
    pub fn resolver(&self) -> Option<ExternalResolver> {
        ExternalTool::from_command(&self.tools.resolver).map(ExternalResolver::new)
    }

    /// The configured resolver, or one that explains it is missing.
    pub fn resolver_or_unconfigured(&self) -> Box<dyn DependencyResolver> {
        match self.resolver() {
            Some(resolver) => Box::new(resolver),
            None => Box::new(UnconfiguredResolver),
        }
    }

    pub fn builder(&self) -> Option<Arc<dyn EnvironmentBuilder>> {
        ExternalTool::from_command(&self.tools.builder)
            .map(|tool| Arc::new(ExternalBuilder::new(tool)) as Arc<dyn EnvironmentBuilder>)
    }

    /// A requirement registry wired to the configured tools.
    pub fn registry(&self) -> Arc<RequirementRegistry> {
        Arc::new(RequirementRegistry::new(self.builder(), self.download_timeout()))
    }
}
