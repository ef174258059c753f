use std::{io, path::PathBuf};

use thiserror::Error;
use tripkeep_core::CoreError;
use tripkeep_domain::BackupType;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("{kind} `{id}` is corrupted and no valid prefix was found ({})", .path.display())]
    DataCorruption {
        kind: String,
        id: String,
        path: PathBuf,
    },
    #[error("{} holds record `{found}`, not `{requested}`", .path.display())]
    IdMismatch {
        requested: String,
        found: String,
        path: PathBuf,
    },
    #[error("record `{0}` not found")]
    RecordNotFound(String),
    #[error("backup `{0}` not found")]
    BackupNotFound(String),
    #[error("backup `{id}` holds a {found} snapshot, expected {expected}")]
    BackupTypeMismatch {
        id: String,
        expected: BackupType,
        found: BackupType,
    },
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}
