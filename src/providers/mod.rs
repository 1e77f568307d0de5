//! Providers for each requirement kind.
//!
//! - [`environment`] - builds the env spec's prefix through the configured builder
//! - [`download`] - fetches files and verifies their checksum
//! - [`service`] - starts local services (redis)
//! - [`variable`] - resolves plain variables from the environment and local state
//!
//! Providers never return errors: every outcome, expected or not, is a
//! [`Status`](crate::core::Status) so prepare can report all of them uniformly.

pub mod download;
pub mod environment;
pub mod service;
pub mod variable;

pub use download::DownloadProvider;
pub use environment::EnvironmentProvider;
pub use service::ServiceProvider;
pub use variable::VariableProvider;

use crate::core::Status;
use crate::requirements::Requirement;

/// Status returned when a provider is handed a requirement of another kind.
pub(crate) fn wrong_kind(provider: &str, requirement: &Requirement) -> Status {
    Status::failure(format!(
        "The {provider} provider cannot handle {} requirements ({}).",
        requirement.kind(),
        requirement.env_var()
    ))
}
