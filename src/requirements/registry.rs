//! Explicit registry of providers and service types.

use super::{Keychain, Provider, RequirementKind, SystemKeychain};
use crate::constants::DEFAULT_DOWNLOAD_TIMEOUT_SECS;
use crate::providers::{DownloadProvider, EnvironmentProvider, ServiceProvider, VariableProvider};
use crate::resolver::EnvironmentBuilder;
use std::sync::Arc;
use std::time::Duration;

/// A service type projects can ask for in `[services]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceType {
    pub name: &'static str,
    /// Variable used when `add-service` is not given one
    pub default_variable: &'static str,
    pub description: &'static str,
}

const SERVICE_TYPES: &[ServiceType] = &[ServiceType {
    name: "redis",
    default_variable: "REDIS_URL",
    description: "A redis server",
}];

/// Maps each requirement kind to its provider.
///
/// Built once by the caller and shared (through the [`crate::project::Project`])
/// with everything that prepares requirements.
pub struct RequirementRegistry {
    environment: EnvironmentProvider,
    download: DownloadProvider,
    service: ServiceProvider,
    variable: VariableProvider,
}

impl std::fmt::Debug for RequirementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequirementRegistry")
            .field("builder_configured", &self.environment.builder().is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RequirementRegistry {
    fn default() -> Self {
        Self::new(None, Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
    }
}

impl RequirementRegistry {
    /// A registry whose environment provider builds through `builder`.
    ///
    /// Without a builder, environments are reported as skipped.
    pub fn new(builder: Option<Arc<dyn EnvironmentBuilder>>, download_timeout: Duration) -> Self {
        Self {
            environment: EnvironmentProvider::new(builder),
            download: DownloadProvider::new(download_timeout),
            service: ServiceProvider::new(),
            variable: VariableProvider::new(Arc::new(SystemKeychain)),
        }
    }

    /// Keep encrypted variable values in `keychain` instead of the system one.
    pub fn with_keychain(mut self, keychain: Arc<dyn Keychain>) -> Self {
        self.variable = VariableProvider::new(keychain);
        self
    }

    /// Where encrypted variable values are stored.
    pub fn keychain(&self) -> &dyn Keychain {
        self.variable.keychain()
    }

    pub fn provider_for(&self, kind: RequirementKind) -> &dyn Provider {
        match kind {
            RequirementKind::Environment => &self.environment,
            RequirementKind::Download => &self.download,
            RequirementKind::Service => &self.service,
            RequirementKind::Variable => &self.variable,
        }
    }

    pub fn environment_builder(&self) -> Option<&dyn EnvironmentBuilder> {
        self.environment.builder()
    }

    pub fn service_types(&self) -> &'static [ServiceType] {
        SERVICE_TYPES
    }

    pub fn service_type(&self, name: &str) -> Option<&'static ServiceType> {
        SERVICE_TYPES.iter().find(|t| t.name == name)
    }

    /// Comma-separated list of the known service type names.
    pub fn service_type_names(&self) -> String {
        SERVICE_TYPES.iter().map(|t| t.name).collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_is_known() {
        let registry = RequirementRegistry::default();
        let redis = registry.service_type("redis").unwrap();
        assert_eq!(redis.default_variable, "REDIS_URL");
        assert!(registry.service_type("mongodb").is_none());
        assert_eq!(registry.service_type_names(), "redis");
        assert!(registry.environment_builder().is_none());
    }
}
