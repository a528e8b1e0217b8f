//! Credential lookup for provider API keys.
//!
//! Keys live in the platform keychain under a fixed service name, with an
//! environment-variable fallback for headless use. An empty value counts as
//! absent everywhere, so "configured as empty string" and "not configured"
//! are indistinguishable to the pipeline.

use keyring::Entry;
use std::collections::HashMap;

/// Keychain service the API keys are stored under.
const SERVICE_NAME: &str = "com.autorename.app";

/// Read-only credential source injected into the pipeline.
pub trait CredentialStore: Send + Sync {
    /// The stored secret for `key`, or `None` when not configured.
    fn load(&self, key: &str) -> Option<String>;
}

/// Platform keychain (macOS Keychain, Secret Service, Windows Credential
/// Manager) via the `keyring` crate.
pub struct KeyringCredentials {
    service: String,
}

impl KeyringCredentials {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Scope entries under a different service name (tests, side-by-side
    /// installs).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Store a key; settings-UI support.
    pub fn store(&self, key: &str, value: &str) -> Result<(), String> {
        Entry::new(&self.service, key)
            .and_then(|entry| entry.set_password(value))
            .map_err(|err| format!("Failed to store credential: {}", err))
    }

    /// Remove a stored key. Missing entries are not an error.
    pub fn delete(&self, key: &str) -> Result<(), String> {
        match Entry::new(&self.service, key) {
            Ok(entry) => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(err) => Err(format!("Failed to delete credential: {}", err)),
            },
            Err(err) => Err(format!("Failed to delete credential: {}", err)),
        }
    }
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentials {
    fn load(&self, key: &str) -> Option<String> {
        let entry = Entry::new(&self.service, key).ok()?;
        entry.get_password().ok().filter(|value| !value.is_empty())
    }
}

/// Environment-variable lookup: `openai_api_key` reads `OPENAI_API_KEY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialStore for EnvCredentials {
    fn load(&self, key: &str) -> Option<String> {
        std::env::var(key.to_uppercase())
            .ok()
            .filter(|value| !value.is_empty())
    }
}

/// Fixed in-memory map; used by tests and by applications that inject
/// secrets from their own storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentials {
    entries: HashMap<String, String>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl CredentialStore for MemoryCredentials {
    fn load(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
    }
}

/// Keychain first, environment second.
pub struct StandardCredentials {
    keyring: KeyringCredentials,
    env: EnvCredentials,
}

impl StandardCredentials {
    pub fn new() -> Self {
        Self {
            keyring: KeyringCredentials::new(),
            env: EnvCredentials,
        }
    }
}

impl Default for StandardCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for StandardCredentials {
    fn load(&self, key: &str) -> Option<String> {
        self.keyring.load(key).or_else(|| self.env.load(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCredentials::new().with("openai_api_key", "sk-test");
        assert_eq!(store.load("openai_api_key").as_deref(), Some("sk-test"));
        assert_eq!(store.load("anthropic_api_key"), None);
    }

    #[test]
    fn test_empty_value_counts_as_absent() {
        let store = MemoryCredentials::new().with("openai_api_key", "");
        assert_eq!(store.load("openai_api_key"), None);
    }

    #[test]
    fn test_env_lookup_uppercases_key() {
        std::env::set_var("AUTORENAME_TEST_API_KEY", "from-env");
        assert_eq!(
            EnvCredentials.load("autorename_test_api_key").as_deref(),
            Some("from-env")
        );
        std::env::remove_var("AUTORENAME_TEST_API_KEY");
    }

    #[test]
    fn test_env_missing_is_none() {
        assert_eq!(EnvCredentials.load("autorename_absent_key"), None);
    }
}
