use std::{env, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Overrides the data root when the config file does not pin one.
pub const DATA_ROOT_ENV: &str = "TRIPKEEP_HOME";
const APP_DIR: &str = "tripkeep";
const FALLBACK_DIR: &str = ".tripkeep";

/// Persisted store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Directory holding `trips/`, `backups/` and the backup catalog.
    pub data_root: Option<PathBuf>,
    #[serde(default = "StoreConfig::default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "StoreConfig::default_keep_latest")]
    pub keep_latest: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            retention_days: Self::default_retention_days(),
            keep_latest: Self::default_keep_latest(),
            log_filter: None,
        }
    }
}

impl StoreConfig {
    pub fn default_retention_days() -> u32 {
        30
    }

    pub fn default_keep_latest() -> usize {
        3
    }

    /// Explicit setting, then `TRIPKEEP_HOME`, then the platform data dir.
    pub fn resolve_data_root(&self) -> PathBuf {
        let from_env = env::var_os(DATA_ROOT_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        self.resolve_data_root_with(from_env)
    }

    pub fn resolve_data_root_with(&self, from_env: Option<PathBuf>) -> PathBuf {
        if let Some(path) = &self.data_root {
            return path.clone();
        }
        if let Some(path) = from_env {
            return path;
        }
        dirs::data_dir()
            .map(|base| base.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR))
    }
}
