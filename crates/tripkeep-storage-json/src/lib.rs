//! tripkeep-storage-json
//!
//! Filesystem persistence for trip records: atomic JSON writes, prefix
//! recovery of corrupted files, and the backup catalog with retention.

pub mod backups;
pub mod catalog;
pub mod codec;
pub mod documents;
pub mod error;
pub mod fs;
pub mod paths;
pub mod recovery;

pub use backups::{
    BackupFilter, BackupManager, BackupPayload, GcOptions, GcReport, StorageStats, SyncReport,
    TypeStats,
};
pub use catalog::BackupCatalog;
pub use codec::{decode_record, parse_document};
pub use documents::DocumentStore;
pub use error::StoreError;
pub use fs::{tmp_path, write_atomic, FileSystem, OsFileSystem};
pub use paths::{file_stem, id_from_stem, StoragePaths};
pub use recovery::recover_prefix;
