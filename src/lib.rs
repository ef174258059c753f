#![doc(test(attr(deny(warnings))))]

//! Tripkeep persists trip itineraries and their cost tracking data as JSON
//! documents, repairs corrupted files, upgrades old schema versions, and keeps
//! a restorable backup of every destructive edit.

pub mod cli;
pub mod errors;
pub mod store;
pub mod utils;

pub use errors::{Result, TripStoreError};
pub use store::{LoadReport, TripStore};

pub use tripkeep_config::{ConfigManager, StoreConfig};
pub use tripkeep_core::{
    validate_all_trip_boundaries, CleanupReport, Clock, ManualClock, SchemaMigrator, SystemClock,
    ValidationError, ValidationErrorKind, ValidationReport,
};
pub use tripkeep_domain::{BackupRecord, BackupType, TripRecord, CURRENT_SCHEMA_VERSION};
pub use tripkeep_storage_json::{
    BackupFilter, FileSystem, GcOptions, GcReport, OsFileSystem, StorageStats, SyncReport,
};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(None);
        tracing::info!("tripkeep tracing initialized");
    });
}
