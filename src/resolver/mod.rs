//! Interfaces to the external package manager.
//!
//! projkit never resolves or installs packages itself. Resolution turns an env
//! spec's inputs into a pinned [`LockSet`]; building materializes an env spec
//! into a prefix directory. Both are blocking calls from the transaction's
//! point of view, with no timeout of their own.
//!
//! [`external`] implements both traits by running a configured command that
//! speaks JSON on stdin/stdout.

pub mod external;

pub use external::{ExternalBuilder, ExternalResolver};

use crate::core::ProjkitError;
use crate::env_spec::EnvSpec;
use crate::lockfile::LockSet;
use std::path::Path;

/// Resolves package specs to pinned records.
pub trait DependencyResolver: Send + Sync {
    /// Resolve `packages` from `channels` for every platform in `platforms`.
    ///
    /// The returned lock set is enabled and untagged; the caller stamps it
    /// with the env spec's logical hash.
    fn resolve(
        &self,
        packages: &[String],
        channels: &[String],
        platforms: &[String],
    ) -> Result<LockSet, ProjkitError>;
}

/// What to build and where.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub prefix: &'a Path,
    pub env_spec: &'a EnvSpec,
    /// Pinned records to install instead of resolving, when locked
    pub locked: Option<&'a [String]>,
    pub platform: &'a str,
}

/// Creates and modifies environments on disk.
pub trait EnvironmentBuilder: Send + Sync {
    /// Create or update the environment at `request.prefix`.
    ///
    /// Returns progress lines to show the user.
    fn build(&self, request: &BuildRequest<'_>) -> Result<Vec<String>, ProjkitError>;

    /// Uninstall `packages` from the environment at `prefix`.
    fn remove_packages(&self, prefix: &Path, packages: &[String]) -> Result<(), ProjkitError>;
}

/// Used when no resolver command is configured; every resolution fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredResolver;

impl DependencyResolver for UnconfiguredResolver {
    fn resolve(
        &self,
        _packages: &[String],
        _channels: &[String],
        _platforms: &[String],
    ) -> Result<LockSet, ProjkitError> {
        Err(ProjkitError::ResolverNotConfigured)
    }
}
