use std::path::PathBuf;

use thiserror::Error;
use tripkeep_config::ConfigError;
use tripkeep_core::CoreError;
use tripkeep_storage_json::StoreError;

/// Error type surfaced by [`crate::TripStore`] and the CLI.
#[derive(Debug, Error)]
pub enum TripStoreError {
    #[error("trip `{0}` not found")]
    RecordNotFound(String),
    #[error("backup `{0}` not found")]
    BackupNotFound(String),
    #[error("{kind} `{id}` is corrupted beyond recovery ({})", .path.display())]
    DataCorruption {
        kind: String,
        id: String,
        path: PathBuf,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage error: {0}")]
    Storage(StoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, TripStoreError>;

impl From<StoreError> for TripStoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RecordNotFound(id) => TripStoreError::RecordNotFound(id),
            StoreError::BackupNotFound(id) => TripStoreError::BackupNotFound(id),
            StoreError::DataCorruption { kind, id, path } => {
                TripStoreError::DataCorruption { kind, id, path }
            }
            StoreError::BackupTypeMismatch { .. } => TripStoreError::InvalidInput(err.to_string()),
            other => TripStoreError::Storage(other),
        }
    }
}

impl From<CoreError> for TripStoreError {
    fn from(err: CoreError) -> Self {
        StoreError::Core(err).into()
    }
}

impl From<serde_json::Error> for TripStoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::from(err).into()
    }
}
