//! Persisted, non-secret settings: model overrides per provider.
//!
//! Settings are a flat string map in a JSON file under the platform config
//! directory. Missing file, unreadable file, and missing key all mean "use
//! the default", so every read path degrades to defaults silently.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;

/// File name inside the config directory.
const SETTINGS_FILE: &str = "settings.json";

/// Directory under the platform config root.
const APP_DIR: &str = "autorename";

/// Read-only settings source injected into the pipeline.
pub trait SettingsStore: Send + Sync {
    /// The configured value for `key`, or `None` to use the built-in default.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Fixed in-memory map for tests and embedding applications.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    entries: HashMap<String, String>,
}

impl MemorySettings {
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

impl SettingsStore for MemorySettings {
    fn lookup(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
    }
}

/// Flat JSON object on disk, re-read on every lookup so external edits are
/// picked up without restarting.
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    /// Settings at the platform default location, e.g.
    /// `~/.config/autorename/settings.json` on Linux.
    pub fn new() -> Result<Self, String> {
        let dir = dirs::config_dir().ok_or("Could not determine config directory")?;
        Ok(Self {
            path: dir.join(APP_DIR).join(SETTINGS_FILE),
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn read_map(&self) -> Map<String, Value> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str::<Map<String, Value>>(&text).ok())
            .unwrap_or_default()
    }

    /// Write one key, creating the file and parent directory as needed.
    pub fn store(&self, key: &str, value: &str) -> Result<(), String> {
        let mut map = self.read_map();
        map.insert(key.to_string(), Value::String(value.to_string()));
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| format!("Failed to create settings directory: {}", err))?;
        }
        let text = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|err| format!("Failed to serialize settings: {}", err))?;
        std::fs::write(&self.path, text)
            .map_err(|err| format!("Failed to write settings: {}", err))
    }
}

impl SettingsStore for JsonFileSettings {
    fn lookup(&self, key: &str) -> Option<String> {
        self.read_map()
            .get(key)
            .and_then(|value| value.as_str())
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_lookup() {
        let store = MemorySettings::new().with("openai_model", "gpt-4o-mini");
        assert_eq!(store.lookup("openai_model").as_deref(), Some("gpt-4o-mini"));
        assert_eq!(store.lookup("anthropic_model"), None);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempdir().unwrap();
        let store = JsonFileSettings::with_path(dir.path().join("settings.json"));
        assert_eq!(store.lookup("openai_model"), None);

        store.store("openai_model", "gpt-4o-mini").unwrap();
        store.store("anthropic_model", "claude-3-5-haiku-latest").unwrap();
        assert_eq!(store.lookup("openai_model").as_deref(), Some("gpt-4o-mini"));
        assert_eq!(
            store.lookup("anthropic_model").as_deref(),
            Some("claude-3-5-haiku-latest")
        );
    }

    #[test]
    fn test_store_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let store = JsonFileSettings::with_path(dir.path().join("nested/app/settings.json"));
        store.store("openai_model", "gpt-4o").unwrap();
        assert_eq!(store.lookup("openai_model").as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_corrupt_file_degrades_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonFileSettings::with_path(&path);
        assert_eq!(store.lookup("openai_model"), None);
        // Writing over a corrupt file starts a fresh map.
        store.store("openai_model", "gpt-4o").unwrap();
        assert_eq!(store.lookup("openai_model").as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_empty_value_means_default() {
        let dir = tempdir().unwrap();
        let store = JsonFileSettings::with_path(dir.path().join("settings.json"));
        store.store("openai_model", "").unwrap();
        assert_eq!(store.lookup("openai_model"), None);
    }
}
