//! Backup catalog entries.

use std::{fmt, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a backup snapshot was taken to protect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    /// Whole trip, taken before the live record is deleted.
    Trip,
    /// Cost tracking data, taken before `costData` and links are scrubbed.
    Cost,
}

impl BackupType {
    pub fn as_str(self) -> &'static str {
        match self {
            BackupType::Trip => "trip",
            BackupType::Cost => "cost",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trip" => Some(BackupType::Trip),
            "cost" => Some(BackupType::Cost),
            _ => None,
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the backup catalog, pointing at an immutable payload file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub original_id: String,
    #[serde(rename = "type")]
    pub backup_type: BackupType,
    pub title: String,
    pub file_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub deleted_at: DateTime<Utc>,
    pub reason: String,
}

impl BackupRecord {
    /// Case-insensitive substring match against title and original id.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.original_id.to_lowercase().contains(&needle)
    }
}
