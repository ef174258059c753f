//! `TripStore` composes the document store, migrator, validator and backup
//! manager behind the operations callers actually use.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use tracing::{info, warn};
use tripkeep_config::StoreConfig;
use tripkeep_core::{
    validate_all_trip_boundaries, CleanupReport, Clock, SchemaMigrator, SystemClock,
    ValidationReport,
};
use tripkeep_domain::{BackupRecord, BackupType, CostTrackingLink, LinkedItemKind, TripRecord};
use tripkeep_storage_json::{
    decode_record, BackupFilter, BackupManager, DocumentStore, FileSystem, GcOptions, GcReport,
    OsFileSystem, StoragePaths, StorageStats, StoreError, SyncReport,
};

use crate::{Result, TripStoreError};

const TRIP_DELETED_REASON: &str = "trip deleted";
const COSTS_CLEARED_REASON: &str = "cost tracking cleared";

/// What happened while loading one record.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub record: TripRecord,
    pub path: PathBuf,
    pub from_version: u32,
    pub migrations: Vec<String>,
    pub cleanup: Option<CleanupReport>,
    pub validation: ValidationReport,
    pub warnings: Vec<String>,
}

impl LoadReport {
    pub fn migrated(&self) -> bool {
        !self.migrations.is_empty()
    }
}

pub struct TripStore {
    paths: StoragePaths,
    documents: Arc<DocumentStore>,
    backups: BackupManager,
    clock: Arc<dyn Clock>,
    gc_defaults: GcOptions,
}

impl TripStore {
    /// Opens a store rooted at `root` on the real filesystem and clock.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::with_backends(root, Arc::new(OsFileSystem), Arc::new(SystemClock));
        std::fs::create_dir_all(&store.paths.trips_dir).map_err(StoreError::from)?;
        Ok(store)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let mut store = Self::open(config.resolve_data_root())?;
        store.gc_defaults = GcOptions {
            retention_days: config.retention_days,
            keep_latest: config.keep_latest,
            dry_run: false,
        };
        Ok(store)
    }

    pub fn with_backends(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let paths = StoragePaths::under(root);
        let documents = Arc::new(DocumentStore::new(&paths, Arc::clone(&fs), Arc::clone(&clock)));
        let backups = BackupManager::new(&paths, Arc::clone(&documents), fs, Arc::clone(&clock));
        Self {
            paths,
            documents,
            backups,
            clock,
            gc_defaults: GcOptions::default(),
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Retention settings taken from the config the store was opened with.
    pub fn gc_defaults(&self) -> GcOptions {
        self.gc_defaults
    }

    pub fn load_record(&self, id: &str) -> Result<Option<TripRecord>> {
        Ok(self.load_record_with_report(id)?.map(|report| report.record))
    }

    /// Loads, upgrades and validates a record. Upgraded documents are written
    /// back so the migration runs once.
    pub fn load_record_with_report(&self, id: &str) -> Result<Option<LoadReport>> {
        let Some(document) = self.documents.load(id)? else {
            return Ok(None);
        };
        let outcome = SchemaMigrator::migrate(document, self.clock.now())?;
        if outcome.migrated() {
            self.documents.save_document(id, &outcome.document)?;
        }
        let record = decode_record(outcome.document)?;

        let validation = validate_all_trip_boundaries(&record);
        let warnings: Vec<String> = validation
            .errors
            .iter()
            .map(|error| error.message.clone())
            .collect();
        if !validation.is_valid {
            warn!(
                trip_id = %record.id,
                invalid_links = validation.errors.len(),
                "trip has cost tracking links to unknown expenses"
            );
        }

        Ok(Some(LoadReport {
            path: self.documents.record_path(id),
            from_version: outcome.from_version,
            migrations: outcome.applied,
            cleanup: outcome.cleanup,
            validation,
            warnings,
            record,
        }))
    }

    pub fn save_record(&self, record: &mut TripRecord) -> Result<()> {
        self.documents.save(record)?;
        Ok(())
    }

    pub fn list_trip_ids(&self) -> Result<Vec<String>> {
        Ok(self.documents.list_ids()?)
    }

    /// Snapshots the record as a `trip` backup, then removes the live file.
    pub fn delete_trip_with_backup(&self, id: &str) -> Result<BackupRecord> {
        let record = self.require_record(id)?;
        let backup = self
            .backups
            .snapshot(&record, BackupType::Trip, TRIP_DELETED_REASON)?;
        self.documents.delete(id)?;
        info!(trip_id = id, backup_id = %backup.id, "trip deleted");
        Ok(backup)
    }

    /// Snapshots the record as a `cost` backup, then drops `costData` and
    /// empties every link list.
    pub fn delete_cost_tracking_with_backup(&self, id: &str) -> Result<BackupRecord> {
        let mut record = self.require_record(id)?;
        let backup = self
            .backups
            .snapshot(&record, BackupType::Cost, COSTS_CLEARED_REASON)?;
        record.cost_data = None;
        let cleared = record.clear_cost_tracking_links();
        self.documents.save(&mut record)?;
        info!(
            trip_id = id,
            backup_id = %backup.id,
            cleared_links = cleared,
            "cost tracking cleared"
        );
        Ok(backup)
    }

    pub fn restore_trip_from_backup(&self, backup_id: &str) -> Result<TripRecord> {
        self.require_backup_type(backup_id, BackupType::Trip)?;
        Ok(self.backups.restore(backup_id)?)
    }

    /// Puts back `costData` and the links of every item the snapshot knew
    /// about. Items added since keep their current links. When the live
    /// record is gone the whole snapshot comes back.
    pub fn restore_cost_tracking_from_backup(&self, backup_id: &str) -> Result<TripRecord> {
        self.require_backup_type(backup_id, BackupType::Cost)?;
        let payload = self.backups.read_backup(backup_id)?;
        let snapshot = payload.trip;

        let Some(mut live) = self.load_record(&snapshot.id)? else {
            let mut whole = snapshot;
            self.documents.save(&mut whole)?;
            info!(backup_id, trip_id = %whole.id, "cost backup restored as whole trip");
            return Ok(whole);
        };

        let saved: HashMap<(LinkedItemKind, String), Vec<CostTrackingLink>> = snapshot
            .linked_items()
            .into_iter()
            .map(|item| ((item.kind, item.id.to_string()), item.links.to_vec()))
            .collect();
        let mut restored_links = 0;
        live.for_each_linked_item_mut(|kind, item_id, links| {
            if let Some(original) = saved.get(&(kind, item_id.to_string())) {
                *links = original.clone();
                restored_links += links.len();
            }
        });
        live.cost_data = snapshot.cost_data;
        self.documents.save(&mut live)?;

        info!(
            backup_id,
            trip_id = %live.id,
            restored_links,
            "cost tracking restored"
        );
        Ok(live)
    }

    pub fn list_backups(&self, filter: &BackupFilter) -> Result<Vec<BackupRecord>> {
        Ok(self.backups.list_backups(filter)?)
    }

    pub fn garbage_collect(&self, options: &GcOptions) -> Result<GcReport> {
        Ok(self.backups.garbage_collect(options)?)
    }

    pub fn synchronize_metadata(&self) -> Result<SyncReport> {
        Ok(self.backups.synchronize_metadata()?)
    }

    pub fn get_storage_stats(&self) -> Result<StorageStats> {
        Ok(self.backups.get_storage_stats()?)
    }

    pub fn validate_all_trip_boundaries(&self, id: &str) -> Result<ValidationReport> {
        let record = self.require_record(id)?;
        Ok(validate_all_trip_boundaries(&record))
    }

    pub fn clear_backup_cache(&self) {
        self.backups.clear_cache();
    }

    fn require_record(&self, id: &str) -> Result<TripRecord> {
        self.load_record(id)?
            .ok_or_else(|| TripStoreError::RecordNotFound(id.to_string()))
    }

    fn require_backup_type(&self, backup_id: &str, expected: BackupType) -> Result<BackupRecord> {
        let backup = self.backups.get_backup(backup_id)?;
        if backup.backup_type != expected {
            return Err(StoreError::BackupTypeMismatch {
                id: backup_id.to_string(),
                expected,
                found: backup.backup_type,
            }
            .into());
        }
        Ok(backup)
    }
}
