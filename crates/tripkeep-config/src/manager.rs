use std::{
    fs,
    path::{Path, PathBuf},
};

use tripkeep_storage_json::{write_atomic, OsFileSystem};

use crate::{ConfigError, StoreConfig};

const CONFIG_FILE: &str = "config.json";

/// Loads and saves [`StoreConfig`] as pretty JSON.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// `<platform config dir>/tripkeep/config.json`, or `./.tripkeep/config.json`.
    pub fn with_default_location() -> Self {
        let base = dirs::config_dir()
            .map(|dir| dir.join("tripkeep"))
            .unwrap_or_else(|| PathBuf::from(".tripkeep"));
        Self::new(base.join(CONFIG_FILE))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A missing file yields defaults.
    pub fn load(&self) -> Result<StoreConfig, ConfigError> {
        if self.config_path.exists() {
            let data = fs::read_to_string(&self.config_path)?;
            serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))
        } else {
            Ok(StoreConfig::default())
        }
    }

    pub fn save(&self, config: &StoreConfig) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        write_atomic(&OsFileSystem, &self.config_path, json.as_bytes())?;
        Ok(())
    }
}
