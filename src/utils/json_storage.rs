//! File-backed storage writing one JSON document per key

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::traits::*;
use crate::types::*;

/// Stores each key as `<data_dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    data_dir: PathBuf,
}

impl JsonFileStorage {
    /// Open storage rooted at `data_dir`, creating the directory if needed
    pub fn open(data_dir: impl Into<PathBuf>) -> LedgerResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|e| {
            LedgerError::Storage(format!(
                "Cannot create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self { data_dir })
    }

    pub fn from_config(config: &StorageConfig) -> LedgerResult<Self> {
        Self::open(&config.data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl LedgerStorage for JsonFileStorage {
    fn read_key(&self, key: &str) -> LedgerResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::Storage(format!(
                "Cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn write_key(&mut self, key: &str, value: &str) -> LedgerResult<()> {
        let path = self.path_for(key);
        let tmp = self.data_dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                LedgerError::Storage(format!("Cannot write {}: {}", path.display(), e))
            })?;
        tracing::debug!(key, bytes = value.len(), "Persisted ledger key");
        Ok(())
    }
}
