//! Storage for the values of `encrypted` variables.
//!
//! Encrypted values never go to the local state file. They live in the
//! system keychain, keyed by the environment prefix and the variable name,
//! so two environments of the same project keep separate secrets.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Keychain service every projkit entry is filed under.
pub const KEYCHAIN_SERVICE: &str = "projkit";

/// A place to keep secret variable values.
pub trait Keychain: Send + Sync {
    /// The stored value, if there is one.
    fn get(&self, env_prefix: &Path, name: &str) -> Result<Option<String>>;

    fn set(&self, env_prefix: &Path, name: &str, value: &str) -> Result<()>;

    /// Forget the stored value. Unsetting a missing entry is not an error.
    fn unset(&self, env_prefix: &Path, name: &str) -> Result<()>;
}

/// Account name of an entry: `<env prefix>/<variable>`.
pub fn entry_user(env_prefix: &Path, name: &str) -> String {
    format!("{}/{name}", env_prefix.display())
}

/// The operating system's credential store, through the `keyring` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    fn entry(env_prefix: &Path, name: &str) -> Result<keyring::Entry> {
        let user = entry_user(env_prefix, name);
        keyring::Entry::new(KEYCHAIN_SERVICE, &user)
            .with_context(|| format!("Failed to open keychain entry for {user}"))
    }
}

impl Keychain for SystemKeychain {
    fn get(&self, env_prefix: &Path, name: &str) -> Result<Option<String>> {
        match Self::entry(env_prefix, name)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {name} from the system keychain")),
        }
    }

    fn set(&self, env_prefix: &Path, name: &str, value: &str) -> Result<()> {
        debug!("Saving {} in the system keychain", entry_user(env_prefix, name));
        Self::entry(env_prefix, name)?
            .set_password(value)
            .with_context(|| format!("Failed to save {name} in the system keychain"))
    }

    fn unset(&self, env_prefix: &Path, name: &str) -> Result<()> {
        match Self::entry(env_prefix, name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {name} from the system keychain")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_user_joins_prefix_and_name() {
        let prefix = Path::new("/work/demo/envs/default");
        assert_eq!(entry_user(prefix, "DB_PASSWORD"), "/work/demo/envs/default/DB_PASSWORD");
    }
}
