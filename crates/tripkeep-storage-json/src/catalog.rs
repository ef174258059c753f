//! The backup catalog file and its per-instance cache.

use std::{
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tripkeep_domain::BackupRecord;

use crate::{
    fs::{write_atomic, FileSystem},
    StoreError,
};

/// Catalog entries are read once and cached until [`BackupCatalog::clear_cache`].
/// Every change is written through before the cache is replaced.
pub struct BackupCatalog {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    cache: Mutex<Option<Vec<BackupRecord>>>,
}

impl BackupCatalog {
    pub fn new(path: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path,
            fs,
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<Vec<BackupRecord>, StoreError> {
        let mut cache = self.lock();
        Ok(self.loaded(&mut cache)?.clone())
    }

    /// Applies `change` to a copy of the entries, persists it, then caches it.
    /// A failed write leaves both the file and the cache as they were.
    pub fn modify<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<BackupRecord>) -> T,
    {
        let mut cache = self.lock();
        let mut entries = self.loaded(&mut cache)?.clone();
        let outcome = change(&mut entries);
        self.persist(&entries)?;
        *cache = Some(entries);
        Ok(outcome)
    }

    pub fn clear_cache(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<BackupRecord>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn loaded<'a>(
        &self,
        cache: &'a mut Option<Vec<BackupRecord>>,
    ) -> Result<&'a mut Vec<BackupRecord>, StoreError> {
        if cache.is_none() {
            *cache = Some(self.read_from_disk()?);
        }
        Ok(cache.get_or_insert_with(Vec::new))
    }

    fn read_from_disk(&self) -> Result<Vec<BackupRecord>, StoreError> {
        let bytes = match self.fs.read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes).map_err(|_| StoreError::DataCorruption {
            kind: "catalog".into(),
            id: "backup-catalog".into(),
            path: self.path.clone(),
        })
    }

    fn persist(&self, entries: &[BackupRecord]) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(entries)?;
        write_atomic(self.fs.as_ref(), &self.path, &data)?;
        Ok(())
    }
}
