//! Global constants used throughout the projkit codebase.
//!
//! File names, directory layout, timeouts and retry parameters that are
//! shared across multiple modules live here so that they are defined once.

/// Name of the project configuration document.
pub const PROJECT_FILE_NAME: &str = "projkit.toml";

/// Name of the lock document stored beside the project configuration.
pub const LOCK_FILE_NAME: &str = "projkit.lock";

/// Name of the per-user state document (variable values and similar).
pub const LOCAL_STATE_FILE_NAME: &str = "projkit-local.toml";

/// Name of the ignore file written next to new projects.
pub const PROJECT_IGNORE_FILE_NAME: &str = ".projectignore";

/// Name given to the implicit env spec when the project declares none.
pub const DEFAULT_ENV_SPEC_NAME: &str = "default";

/// Directory (relative to the project) holding environment prefixes.
pub const ENVS_DIR: &str = "envs";

/// Directory (relative to the project) holding service state.
pub const SERVICES_DIR: &str = "services";

/// Hidden per-project working directory (locks and markers).
pub const STATE_DIR: &str = ".projkit";

/// Marker file written inside a built environment prefix.
pub const ENV_MARKER_FILE_NAME: &str = ".projkit-env.json";

/// Environment variable through which the prepared environment prefix is published.
pub const ENV_PREFIX_VAR: &str = "PROJKIT_ENV_PREFIX";

/// Environment variable that overrides the global configuration path.
pub const CONFIG_PATH_VAR: &str = "PROJKIT_CONFIG";

/// Default wait for the project lock, in seconds.
///
/// Long enough to cover a dependency resolution running in another process.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 120;

/// Lock file inside [`STATE_DIR`] held for the length of a transaction.
pub const PROJECT_LOCK_FILE_NAME: &str = "transaction.lock";

/// Default timeout for a single download (5 minutes).
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Maximum backoff delay for exponential backoff (500ms).
///
/// Exponential backoff delays are capped at this value to prevent
/// excessive wait times during retry operations.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting delay for exponential backoff (10ms).
///
/// This is the initial delay used in exponential backoff calculations,
/// which doubles on each retry attempt.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Content written to `.projectignore` for a freshly created project.
pub const DEFAULT_PROJECT_IGNORE: &str = "\
# projkit-local.toml contains your personal configuration choices and state
/projkit-local.toml

# Project working state
/.projkit/
/envs/
/services/

# Files autocreated by Python
__pycache__/
*.pyc
*.pyo
*.pyd

# Notebook stuff
/.ipynb_checkpoints
";
