//! projkit - reproducible project directories for data science work
//!
//! A project is a directory with a `projkit.toml` describing what it needs:
//! conda environments (env specs), files to download, services to run,
//! variables to set and commands to run. Resolved dependencies are pinned per
//! env spec in `projkit.lock`.
//!
//! # Architecture Overview
//!
//! Every change to a project goes through one transaction pattern: edit the
//! in-memory documents, promote the edit so the project model sees it, check
//! that the affected requirements can be satisfied, then save or revert. The
//! lock file is kept in step with the project file after every edit: env specs
//! whose logical hash changed are re-resolved before anything is written.
//!
//! # Core Modules
//!
//! ## Project model
//! - [`document`] - identity-preserving TOML documents (`toml_edit`)
//! - [`project`] - the project model derived from `projkit.toml`
//! - [`env_spec`] - env specs, package specs, platforms and logical hashes
//! - [`lockfile`] - lock sets and `projkit.lock`
//!
//! ## Requirements
//! - [`requirements`] - requirement kinds and the provider registry
//! - [`providers`] - environment, download, service and variable providers
//! - [`prepare`] - the prepare engine that checks a project can run
//! - [`resolver`] - interfaces to the external resolver and builder
//!
//! ## Operations
//! - [`transaction`] - the coordinator every edit goes through, and lock sync
//! - [`ops`] - user-facing operations built on the coordinator
//!
//! ## Supporting Modules
//! - [`cli`] - command-line interface
//! - [`config`] - global user configuration
//! - [`core`] - errors and [`core::Status`]
//! - [`constants`] - file names and defaults
//! - [`utils`] - atomic writes, directory helpers, the project lock
//!
//! # Project File Format (projkit.toml)
//!
//! ```toml
//! name = "demo"
//! packages = ["python=3.12"]
//! channels = ["conda-forge"]
//! platforms = ["linux-64", "osx-arm64", "win-64"]
//!
//! [env_specs.default]
//! packages = ["numpy"]
//!
//! [downloads]
//! DATA = { url = "https://example.com/data.csv", sha256 = "..." }
//!
//! [services]
//! REDIS_URL = "redis"
//!
//! [variables]
//! PORT = "8080"
//!
//! [commands.serve]
//! unix = "python serve.py"
//! env_spec = "default"
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod document;
pub mod env_spec;
pub mod lockfile;
pub mod ops;
pub mod prepare;
pub mod project;
pub mod providers;
pub mod requirements;
pub mod resolver;
pub mod transaction;
pub mod utils;

// test_utils is available for tests and for the integration suite via the
// test-utils feature
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
