//! Requirements a project needs satisfied before its commands can run.
//!
//! Every requirement is one variant of the closed [`Requirement`] enum and
//! carries the data its provider needs. The project derives its requirement
//! list from the config document; the [`RequirementRegistry`] hands each one
//! to the single [`Provider`] for its [`RequirementKind`].

pub mod keychain;
pub mod registry;

pub use keychain::{Keychain, SystemKeychain};
pub use registry::{RequirementRegistry, ServiceType};

use crate::core::Status;
use crate::env_spec::EnvSpec;
use crate::project::local_state::LocalState;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The kinds of requirement a project can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequirementKind {
    /// A built environment for an env spec
    Environment,
    /// A file fetched from a URL
    Download,
    /// A running service such as redis
    Service,
    /// A plain environment variable
    Variable,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Environment => "environment",
            Self::Download => "download",
            Self::Service => "service",
            Self::Variable => "variable",
        };
        f.write_str(name)
    }
}

/// Checksum algorithms accepted for downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [Self; 4] = [Self::Sha224, Self::Sha256, Self::Sha384, Self::Sha512];

    /// Key used for the checksum in a download entry.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|algorithm| algorithm.key() == key)
    }
}

/// One thing the project needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// The environment for the selected env spec; its prefix goes in `env_var`
    Environment { env_var: String },
    Download {
        env_var: String,
        url: String,
        /// File name inside the project directory
        filename: String,
        hash: Option<(HashAlgorithm, String)>,
        description: Option<String>,
    },
    Service {
        env_var: String,
        service_type: String,
    },
    Variable {
        env_var: String,
        default: Option<String>,
        description: Option<String>,
        encrypted: bool,
    },
}

impl Requirement {
    pub const fn kind(&self) -> RequirementKind {
        match self {
            Self::Environment { .. } => RequirementKind::Environment,
            Self::Download { .. } => RequirementKind::Download,
            Self::Service { .. } => RequirementKind::Service,
            Self::Variable { .. } => RequirementKind::Variable,
        }
    }

    /// The environment variable this requirement sets.
    pub fn env_var(&self) -> &str {
        match self {
            Self::Environment { env_var }
            | Self::Download { env_var, .. }
            | Self::Service { env_var, .. }
            | Self::Variable { env_var, .. } => env_var,
        }
    }

    /// Short human-readable name.
    pub fn title(&self) -> String {
        match self {
            Self::Environment { .. } => "Conda environment".to_string(),
            Self::Download { filename, .. } => {
                format!("A downloaded file which is referenced by {filename}")
            }
            Self::Service {
                service_type,
                env_var,
            } => format!("A running {service_type} server ({env_var})"),
            Self::Variable { env_var, description, .. } => {
                description.clone().unwrap_or_else(|| format!("{env_var} environment variable"))
            }
        }
    }
}

/// An entry of a prepare whitelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvideTarget {
    /// Every requirement of this kind
    Kind(RequirementKind),
    /// The requirement that sets this environment variable
    Variable(String),
}

impl ProvideTarget {
    pub fn matches(&self, requirement: &Requirement) -> bool {
        match self {
            Self::Kind(kind) => requirement.kind() == *kind,
            Self::Variable(name) => requirement.env_var() == name,
        }
    }
}

impl fmt::Display for ProvideTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => write!(f, "{kind} requirements"),
            Self::Variable(name) => write!(f, "requirement {name}"),
        }
    }
}

/// What a provider sees while satisfying one requirement.
pub struct ProvideContext<'a> {
    pub project_dir: &'a Path,
    /// The env spec selected for this prepare
    pub env_spec: Option<&'a EnvSpec>,
    /// Variables accumulated so far; providers add what they provide
    pub environ: &'a mut BTreeMap<String, String>,
    pub local_state: &'a mut LocalState,
}

/// Knows how to satisfy, and later tear down, one kind of requirement.
pub trait Provider: Send + Sync {
    /// Make `requirement` available, recording its value in `context.environ`.
    fn provide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status;

    /// Undo whatever [`Provider::provide`] left behind.
    fn unprovide(&self, requirement: &Requirement, context: &mut ProvideContext<'_>) -> Status;
}
