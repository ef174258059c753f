//! Point-in-time snapshots guarding every destructive edit.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use tripkeep_core::{strip_dangling_links, Clock, LinkRemoval, SchemaMigrator};
use tripkeep_domain::{BackupRecord, BackupType, TripRecord};
use uuid::Uuid;

use crate::{
    catalog::BackupCatalog,
    codec::{decode_record, parse_document},
    documents::DocumentStore,
    fs::{write_atomic, FileSystem},
    paths::{
        file_stem, file_timestamp, id_from_stem, parse_stamped_name, unique_file, StoragePaths,
        JSON_EXTENSION,
    },
    recovery::recover_prefix,
    StoreError,
};

pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_KEEP_LATEST: usize = 3;
const ADOPTED_REASON: &str = "recovered orphaned backup";

/// Criteria for [`BackupManager::list_backups`]; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BackupFilter {
    pub backup_type: Option<BackupType>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search_query: Option<String>,
}

impl BackupFilter {
    pub fn of_type(backup_type: BackupType) -> Self {
        Self {
            backup_type: Some(backup_type),
            ..Self::default()
        }
    }

    pub fn matches(&self, backup: &BackupRecord) -> bool {
        self.backup_type.map_or(true, |kind| backup.backup_type == kind)
            && self.date_from.map_or(true, |from| backup.created_at >= from)
            && self.date_to.map_or(true, |to| backup.created_at <= to)
            && self
                .search_query
                .as_deref()
                .map_or(true, |query| backup.matches_query(query))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStats {
    pub count: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_backups: usize,
    pub total_bytes: u64,
    pub by_type: BTreeMap<BackupType, TypeStats>,
    pub oldest_backup: Option<DateTime<Utc>>,
    pub newest_backup: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcOptions {
    pub retention_days: u32,
    /// Newest candidates exempted within each `(originalId, type)` bucket.
    pub keep_latest: usize,
    pub dry_run: bool,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            keep_latest: DEFAULT_KEEP_LATEST,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub deleted: Vec<BackupRecord>,
    pub retained: Vec<BackupRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub removed: Vec<BackupRecord>,
    pub adopted: Vec<BackupRecord>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty() && self.adopted.is_empty()
    }
}

/// A backup payload brought up to the current schema with dangling links removed.
#[derive(Debug, Clone)]
pub struct BackupPayload {
    pub backup: BackupRecord,
    pub trip: TripRecord,
    pub applied_migrations: Vec<String>,
    pub removed_links: Vec<LinkRemoval>,
}

pub struct BackupManager {
    backups_dir: PathBuf,
    catalog: BackupCatalog,
    documents: Arc<DocumentStore>,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
}

impl BackupManager {
    pub fn new(
        paths: &StoragePaths,
        documents: Arc<DocumentStore>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backups_dir: paths.backups_dir.clone(),
            catalog: BackupCatalog::new(paths.catalog_file.clone(), Arc::clone(&fs)),
            documents,
            fs,
            clock,
        }
    }

    pub fn catalog(&self) -> &BackupCatalog {
        &self.catalog
    }

    /// Payloads always live in the backups directory; only the recorded file
    /// name is trusted.
    pub fn payload_path(&self, backup: &BackupRecord) -> PathBuf {
        match backup.file_path.file_name() {
            Some(name) => self.backups_dir.join(name),
            None => backup.file_path.clone(),
        }
    }

    /// Writes the payload, then its catalog entry. Any error surfaces before
    /// the caller is allowed to touch the live record.
    pub fn snapshot(
        &self,
        record: &TripRecord,
        backup_type: BackupType,
        reason: &str,
    ) -> Result<BackupRecord, StoreError> {
        let base = format!(
            "{}-{}-{}",
            backup_type,
            file_stem(&record.id),
            file_timestamp(self.clock.now())
        );
        self.fs.create_dir_all(&self.backups_dir)?;
        let path = unique_file(self.fs.as_ref(), &self.backups_dir, &base);
        let data = serde_json::to_vec_pretty(record)?;
        write_atomic(self.fs.as_ref(), &path, &data)?;

        let title = if record.title.trim().is_empty() {
            record.id.as_str()
        } else {
            record.title.as_str()
        };
        let backup = self.add_backup_metadata(&record.id, backup_type, title, path, reason)?;
        info!(
            backup_id = %backup.id,
            original_id = %backup.original_id,
            backup_type = %backup.backup_type,
            reason,
            "backup snapshot written"
        );
        Ok(backup)
    }

    pub fn add_backup_metadata(
        &self,
        original_id: &str,
        backup_type: BackupType,
        title: &str,
        file_path: PathBuf,
        reason: &str,
    ) -> Result<BackupRecord, StoreError> {
        let now = self.clock.now();
        let backup = BackupRecord {
            id: Uuid::new_v4().to_string(),
            original_id: original_id.to_string(),
            backup_type,
            title: title.to_string(),
            file_path,
            created_at: now,
            deleted_at: now,
            reason: reason.to_string(),
        };
        let entry = backup.clone();
        self.catalog.modify(move |entries| entries.push(entry))?;
        Ok(backup)
    }

    /// Matching entries, newest first.
    pub fn list_backups(&self, filter: &BackupFilter) -> Result<Vec<BackupRecord>, StoreError> {
        let mut rows: Vec<BackupRecord> = self
            .catalog
            .entries()?
            .into_iter()
            .filter(|backup| filter.matches(backup))
            .collect();
        sort_newest_first(&mut rows);
        Ok(rows)
    }

    pub fn get_backup(&self, backup_id: &str) -> Result<BackupRecord, StoreError> {
        self.catalog
            .entries()?
            .into_iter()
            .find(|backup| backup.id == backup_id)
            .ok_or_else(|| StoreError::BackupNotFound(backup_id.to_string()))
    }

    pub fn get_storage_stats(&self) -> Result<StorageStats, StoreError> {
        let mut stats = StorageStats::default();
        for backup in self.catalog.entries()? {
            let bytes = self.fs.file_size(&self.payload_path(&backup)).unwrap_or(0);
            stats.total_backups += 1;
            stats.total_bytes += bytes;
            let per_type = stats.by_type.entry(backup.backup_type).or_default();
            per_type.count += 1;
            per_type.bytes += bytes;
            stats.oldest_backup = Some(
                stats
                    .oldest_backup
                    .map_or(backup.created_at, |at| at.min(backup.created_at)),
            );
            stats.newest_backup = Some(
                stats
                    .newest_backup
                    .map_or(backup.created_at, |at| at.max(backup.created_at)),
            );
        }
        Ok(stats)
    }

    /// Deletes backups older than the retention window, sparing the newest
    /// `keep_latest` candidates of each `(originalId, type)` bucket.
    pub fn garbage_collect(&self, options: &GcOptions) -> Result<GcReport, StoreError> {
        let now = self.clock.now();
        let retention = Duration::days(i64::from(options.retention_days));
        let mut entries = self.catalog.entries()?;
        sort_newest_first(&mut entries);

        let mut buckets: HashMap<(&str, BackupType), usize> = HashMap::new();
        let mut doomed = HashSet::new();
        for backup in &entries {
            if now - backup.created_at <= retention {
                continue;
            }
            let seen = buckets
                .entry((backup.original_id.as_str(), backup.backup_type))
                .or_insert(0);
            *seen += 1;
            if *seen > options.keep_latest {
                doomed.insert(backup.id.clone());
            }
        }

        let (deleted, retained): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|backup| doomed.contains(&backup.id));

        if !options.dry_run && !deleted.is_empty() {
            for backup in &deleted {
                match self.fs.remove_file(&self.payload_path(backup)) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
            self.catalog
                .modify(|entries| entries.retain(|backup| !doomed.contains(&backup.id)))?;
        }

        info!(
            deleted = deleted.len(),
            retained = retained.len(),
            dry_run = options.dry_run,
            "backup garbage collection finished"
        );
        Ok(GcReport { deleted, retained })
    }

    /// Drops entries whose payload vanished and adopts payloads the catalog
    /// never heard of.
    pub fn synchronize_metadata(&self) -> Result<SyncReport, StoreError> {
        let files: Vec<PathBuf> = self
            .fs
            .list_dir(&self.backups_dir)?
            .into_iter()
            .filter(|path| path.extension().and_then(OsStr::to_str) == Some(JSON_EXTENSION))
            .collect();

        let report = self.catalog.modify(|entries| {
            let mut report = SyncReport::default();
            entries.retain(|backup| {
                let present = self.fs.exists(&self.payload_path(backup));
                if !present {
                    report.removed.push(backup.clone());
                }
                present
            });

            let known: HashSet<PathBuf> = entries
                .iter()
                .map(|backup| self.payload_path(backup))
                .collect();
            for file in files.iter().filter(|file| !known.contains(*file)) {
                if let Some(adopted) = self.adopt_orphan(file) {
                    entries.push(adopted.clone());
                    report.adopted.push(adopted);
                }
            }
            report
        })?;

        for backup in &report.removed {
            warn!(backup_id = %backup.id, original_id = %backup.original_id, "dropped catalog entry without payload");
        }
        for backup in &report.adopted {
            warn!(backup_id = %backup.id, path = %backup.file_path.display(), "adopted orphaned backup payload");
        }
        Ok(report)
    }

    /// Loads a payload and brings it up to date. Unknown ids and missing
    /// payload files are both `BackupNotFound`.
    pub fn read_backup(&self, backup_id: &str) -> Result<BackupPayload, StoreError> {
        let backup = self.get_backup(backup_id)?;
        let path = self.payload_path(&backup);
        let bytes = match self.fs.read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::BackupNotFound(backup_id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let document = parse_document(&bytes)
            .ok()
            .or_else(|| recover_prefix(&bytes))
            .ok_or_else(|| StoreError::DataCorruption {
                kind: "backup".into(),
                id: backup_id.to_string(),
                path: path.clone(),
            })?;

        let outcome = SchemaMigrator::migrate(document, self.clock.now())?;
        let mut removed_links = outcome
            .cleanup
            .map(|report| report.removals)
            .unwrap_or_default();
        let mut document = outcome.document;
        removed_links.extend(strip_dangling_links(&mut document));
        let trip = decode_record(document)?;

        Ok(BackupPayload {
            backup,
            trip,
            applied_migrations: outcome.applied,
            removed_links,
        })
    }

    /// Writes the migrated payload back as the live record.
    pub fn restore(&self, backup_id: &str) -> Result<TripRecord, StoreError> {
        let payload = self.read_backup(backup_id)?;
        let mut trip = payload.trip;
        self.documents.save(&mut trip)?;
        info!(
            backup_id,
            trip_id = %trip.id,
            migrations = payload.applied_migrations.len(),
            removed_links = payload.removed_links.len(),
            "backup restored"
        );
        Ok(trip)
    }

    pub fn delete_backup(&self, backup_id: &str) -> Result<BackupRecord, StoreError> {
        let backup = self.get_backup(backup_id)?;
        match self.fs.remove_file(&self.payload_path(&backup)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.catalog
            .modify(|entries| entries.retain(|entry| entry.id != backup_id))?;
        Ok(backup)
    }

    pub fn clear_cache(&self) {
        self.catalog.clear_cache();
    }

    fn adopt_orphan(&self, file: &Path) -> Option<BackupRecord> {
        let name = file.file_name().and_then(OsStr::to_str)?;
        let parsed = [BackupType::Trip, BackupType::Cost]
            .into_iter()
            .find_map(|kind| {
                parse_stamped_name(name, kind.as_str()).map(|(stem, at)| (kind, stem, at))
            });
        let Some((backup_type, stem, created_at)) = parsed else {
            warn!(file = name, "skipping backup file with unrecognised name");
            return None;
        };

        let payload = self
            .fs
            .read(file)
            .ok()
            .and_then(|bytes| parse_document(&bytes).ok());
        let field = |key: &str| {
            payload
                .as_ref()
                .and_then(|doc| doc.get(key))
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
        };
        let original_id = field("id")
            .or_else(|| id_from_stem(stem))
            .unwrap_or_else(|| stem.to_string());
        let title = field("title").unwrap_or_else(|| original_id.clone());

        Some(BackupRecord {
            id: Uuid::new_v4().to_string(),
            original_id,
            backup_type,
            title,
            file_path: file.to_path_buf(),
            created_at,
            deleted_at: created_at,
            reason: ADOPTED_REASON.to_string(),
        })
    }
}

fn sort_newest_first(rows: &mut [BackupRecord]) {
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
