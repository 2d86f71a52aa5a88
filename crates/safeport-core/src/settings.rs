//! Application settings management
//!
//! Stores non-sensitive configuration in a plain JSON file next to the
//! artifact stores.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::crypto::KeySize;
use crate::error::{Result, SafePortError};
use crate::storage::{StoreConfig, DEFAULT_CAPACITY_BYTES};

const SETTINGS_VERSION: u32 = 1;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Settings file version
    pub version: u32,
    /// Key size used when none is given
    pub default_algorithm: KeySize,
    /// SQLite database file, relative to the data directory
    pub database_file: String,
    /// Fallback JSON document, relative to the data directory
    pub fallback_file: String,
    /// Size cap for the fallback document
    pub fallback_capacity_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            default_algorithm: KeySize::default(),
            database_file: "artifacts.db".to_string(),
            fallback_file: "fallback.json".to_string(),
            fallback_capacity_bytes: DEFAULT_CAPACITY_BYTES,
        }
    }
}

impl Settings {
    /// Resolve store locations against `data_dir`
    pub fn store_config(&self, data_dir: &Path) -> StoreConfig {
        StoreConfig {
            database_path: data_dir.join(&self.database_file),
            fallback_path: data_dir.join(&self.fallback_file),
            fallback_capacity: self.fallback_capacity_bytes,
        }
    }
}

/// Get the default data directory
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "safeport", "safeport")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| SafePortError::StorageError("Could not determine data directory".to_string()))
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: Settings,
}

impl SettingsManager {
    /// Load settings from `data_dir`, falling back to defaults
    pub fn new(data_dir: &Path) -> Self {
        let settings_file = data_dir.join("settings.json");
        let settings = match Self::load_from_file(&settings_file) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings file {:?}: {}", settings_file, e);
                Settings::default()
            }
        };

        Self {
            settings_file,
            settings,
        }
    }

    fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.settings)?;
        if let Some(parent) = self.settings_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write atomically using temp file
        let temp_path = self.settings_file.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents).await?;
        tokio::fs::rename(&temp_path, &self.settings_file).await?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    /// Get current settings
    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Update settings and save
    pub async fn update(&mut self, settings: Settings) -> Result<()> {
        self.settings = settings;
        self.save().await
    }

    /// Set the default algorithm and save
    pub async fn set_default_algorithm(&mut self, algorithm: KeySize) -> Result<()> {
        self.settings.default_algorithm = algorithm;
        self.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_settings_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path());

        let settings = manager.get();
        assert_eq!(settings.default_algorithm, KeySize::Aes256);
        assert_eq!(settings.fallback_capacity_bytes, 5 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut manager = SettingsManager::new(temp_dir.path());
            manager.get_mut().fallback_capacity_bytes = 1024;
            manager.set_default_algorithm(KeySize::Aes128).await.unwrap();
        }

        {
            let manager = SettingsManager::new(temp_dir.path());
            assert_eq!(manager.get().default_algorithm, KeySize::Aes128);
            assert_eq!(manager.get().fallback_capacity_bytes, 1024);
        }
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("settings.json"),
            r#"{"defaultAlgorithm":"aes-192"}"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path());
        assert_eq!(manager.get().default_algorithm, KeySize::Aes192);
        assert_eq!(manager.get().database_file, "artifacts.db");
    }

    #[tokio::test]
    async fn test_corrupt_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("settings.json"), b"not json").unwrap();

        let manager = SettingsManager::new(temp_dir.path());
        assert_eq!(manager.get(), &Settings::default());
    }

    #[test]
    fn test_store_config_paths() {
        let config = Settings::default().store_config(Path::new("/data"));
        assert_eq!(config.database_path, Path::new("/data/artifacts.db"));
        assert_eq!(config.fallback_path, Path::new("/data/fallback.json"));
    }
}
