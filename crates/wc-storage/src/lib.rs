//! Size-bounded client-side persistence for the catalog and the last selection.
//!
//! A [`KeyValueStore`] is the string store (browser `localStorage`, a JSON file,
//! memory). [`CatalogPersistence`] layers the payload format on top: plain JSON
//! while the catalog fits the quota, a [`Compressor`] transform above it.

mod compress;
mod persistence;

use std::collections::BTreeMap;

pub use compress::{CompressionError, Compressor, NoCompression};
#[cfg(feature = "zstd")]
pub use compress::ZstdCompressor;
pub use persistence::{CatalogPersistence, DEFAULT_QUOTA_BYTES, SaveOutcome, keys};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage limit exceeded: {reason}")]
    LimitExceeded { reason: String },
    #[error("compression is unavailable")]
    CompressionUnavailable,
    #[error("quota exceeded writing {key} ({bytes} bytes)")]
    QuotaExceeded { key: String, bytes: usize },
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decompress {key}: {source}")]
    Decompress {
        key: String,
        #[source]
        source: CompressionError,
    },
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A flat string-to-string store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    /// Bytes held by keys and values together.
    fn bytes_used(&self) -> usize;
}

/// Memory-backed store with an optional byte capacity, mirroring a browser quota.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: BTreeMap<String, String>,
    capacity: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: Some(capacity_bytes),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(capacity) = self.capacity {
            let replaced = self
                .entries
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or_default();
            let projected = self.bytes_used() - replaced + key.len() + value.len();
            if projected > capacity {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_owned(),
                    bytes: value.len(),
                });
            }
        }
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn bytes_used(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_counts_keys_and_values() {
        let mut store = InMemoryStore::with_capacity(10);
        store.set("ab", "cdef").unwrap();
        assert_eq!(store.bytes_used(), 6);

        let err = store.set("gh", "ijklm").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert!(!store.contains_key("gh"));
    }

    #[test]
    fn overwrite_reuses_the_replaced_bytes() {
        let mut store = InMemoryStore::with_capacity(10);
        store.set("ab", "cdefgh").unwrap();
        store.set("ab", "12345678").unwrap();
        assert_eq!(store.get("ab").as_deref(), Some("12345678"));
        assert_eq!(store.len(), 1);
    }
}
