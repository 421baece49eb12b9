use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use wc_storage::{KeyValueStore, StorageError};

/// Key-value store persisted as one JSON object on disk.
///
/// Every mutation rewrites the file; a failed write leaves the in-memory
/// entries as they were before the call.
pub(crate) struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub(crate) fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read store file: {}", path.display()))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("store file is not a JSON object: {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        debug!("opened store {} with {} keys", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self) -> Result<(), StorageError> {
        let body = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        fs::write(&self.path, body)
            .map_err(|err| StorageError::Backend(format!("{}: {err}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self.entries.insert(key.to_owned(), value.to_owned());
        if let Err(err) = self.write_file() {
            match previous {
                Some(old) => self.entries.insert(key.to_owned(), old),
                None => self.entries.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.write_file() {
            self.entries.insert(key.to_owned(), previous);
            return Err(err);
        }
        Ok(())
    }

    fn bytes_used(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wc_catalog::Catalog;
    use wc_storage::{CatalogPersistence, SaveOutcome, ZstdCompressor, keys};

    #[test]
    fn entries_survive_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store.json");

        let mut store = FileStore::open(&path)?;
        store.set("lastDataRefresh", "42")?;
        store.set("doomed", "x")?;
        store.remove("doomed")?;
        store.remove("never-there")?;

        let reopened = FileStore::open(&path)?;
        assert_eq!(reopened.get("lastDataRefresh").as_deref(), Some("42"));
        assert_eq!(reopened.get("doomed"), None);
        assert_eq!(reopened.bytes_used(), "lastDataRefresh".len() + 2);
        Ok(())
    }

    #[test]
    fn corrupt_file_fails_to_open() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store.json");
        fs::write(&path, "[1, 2")?;

        let err = FileStore::open(&path).err().map(|err| format!("{err:#}"));
        assert!(err.is_some_and(|msg| msg.contains("not a JSON object")));
        Ok(())
    }

    #[test]
    fn failed_write_keeps_memory_consistent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut store = FileStore::open(dir.path().join("missing-dir").join("store.json"))?;

        assert!(matches!(store.set("k", "v"), Err(StorageError::Backend(_))));
        assert_eq!(store.get("k"), None);
        assert_eq!(store.bytes_used(), 0);
        Ok(())
    }

    #[test]
    fn compressed_catalog_round_trips_through_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store.json");
        let catalog = Catalog::builtin();

        let mut persistence =
            CatalogPersistence::new(FileStore::open(&path)?, ZstdCompressor::default()).with_quota(64);
        assert_eq!(persistence.save_catalog(&catalog, 7)?, SaveOutcome::Compressed);

        let reopened = CatalogPersistence::new(FileStore::open(&path)?, ZstdCompressor::default());
        assert_eq!(
            reopened.store().get(&keys::compressed_flag(keys::VEHICLE_DATA)).as_deref(),
            Some("true")
        );
        assert_eq!(reopened.load_catalog()?, catalog);
        assert_eq!(reopened.last_refresh(), Some(7));
        Ok(())
    }
}
