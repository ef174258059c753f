//! Live record files: one pretty-printed JSON document per trip id.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::Value;
use tracing::{error, warn};
use tripkeep_core::{has_required_keys, scalar_to_string, Clock, CoreError};
use tripkeep_domain::TripRecord;

use crate::{
    codec::parse_document,
    fs::{write_atomic, FileSystem},
    paths::{file_stem, file_timestamp, id_from_stem, unique_file, StoragePaths, JSON_EXTENSION},
    recovery::{balanced_object_span, recover_prefix},
    StoreError,
};

const RECORD_KIND: &str = "trip";

pub struct DocumentStore {
    kind: &'static str,
    records_dir: PathBuf,
    corrupted_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
}

impl DocumentStore {
    pub fn new(paths: &StoragePaths, fs: Arc<dyn FileSystem>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kind: RECORD_KIND,
            records_dir: paths.trips_dir.clone(),
            corrupted_dir: paths.corrupted_dir.clone(),
            fs,
            clock,
        }
    }

    pub fn kind(&self) -> &str {
        self.kind
    }

    pub fn record_path(&self, id: &str) -> PathBuf {
        self.records_dir
            .join(format!("{}.{}", file_stem(id), JSON_EXTENSION))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.fs.exists(&self.record_path(id))
    }

    /// Reads the raw document for `id`, repairing it from its valid prefix
    /// when the file is corrupted. A missing file yields `None`; a file
    /// holding another record's id is `IdMismatch`.
    pub fn load(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let path = self.record_path(id);
        let bytes = match self.fs.read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let document = match parse_document(&bytes) {
            Ok(document) if has_required_keys(&document) => document,
            _ => self.recover(id, &path, &bytes)?,
        };
        let stored_id = document
            .get("id")
            .and_then(scalar_to_string)
            .unwrap_or_default();
        if stored_id != id {
            return Err(StoreError::IdMismatch {
                requested: id.to_string(),
                found: stored_id,
                path,
            });
        }
        Ok(Some(document))
    }

    /// Stamps `updatedAt` and writes the record atomically.
    pub fn save(&self, record: &mut TripRecord) -> Result<(), StoreError> {
        if record.id.trim().is_empty() {
            return Err(CoreError::InvalidDocument("record id must not be empty".into()).into());
        }
        record.touch(self.clock.now());
        let data = serde_json::to_vec_pretty(record)?;
        write_atomic(self.fs.as_ref(), &self.record_path(&record.id), &data)?;
        Ok(())
    }

    /// Writes an already-shaped document without touching its timestamps.
    pub fn save_document(&self, id: &str, document: &Value) -> Result<(), StoreError> {
        if !has_required_keys(document) {
            return Err(CoreError::InvalidDocument(format!(
                "document for `{}` lacks id or schemaVersion",
                id
            ))
            .into());
        }
        let data = serde_json::to_vec_pretty(document)?;
        write_atomic(self.fs.as_ref(), &self.record_path(id), &data)?;
        Ok(())
    }

    /// Removes the live file. Callers snapshot first; this never does.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        match self.fs.remove_file(&self.record_path(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Ids of every live record, sorted. Files whose names the store could not
    /// have written are skipped.
    pub fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .fs
            .list_dir(&self.records_dir)?
            .into_iter()
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(JSON_EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(id_from_stem)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn recover(&self, id: &str, path: &Path, bytes: &[u8]) -> Result<Value, StoreError> {
        let Some(document) = recover_prefix(bytes) else {
            error!(kind = self.kind, id, path = %path.display(), "no valid JSON prefix, file left untouched");
            return Err(StoreError::DataCorruption {
                kind: self.kind.to_string(),
                id: id.to_string(),
                path: path.to_path_buf(),
            });
        };

        let archive = self.archive_corrupted(id, bytes)?;
        let data = serde_json::to_vec_pretty(&document)?;
        write_atomic(self.fs.as_ref(), path, &data)?;

        let kept = balanced_object_span(bytes).map_or(0, |span| span.end);
        warn!(
            kind = self.kind,
            id,
            archive = %archive.display(),
            discarded_bytes = bytes.len().saturating_sub(kept),
            "recovered corrupted record from its valid prefix"
        );
        Ok(document)
    }

    fn archive_corrupted(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let base = format!(
            "corrupted-{}-{}-{}",
            self.kind,
            file_stem(id),
            file_timestamp(self.clock.now())
        );
        self.fs.create_dir_all(&self.corrupted_dir)?;
        let archive = unique_file(self.fs.as_ref(), &self.corrupted_dir, &base);
        write_atomic(self.fs.as_ref(), &archive, bytes)?;
        Ok(archive)
    }
}
