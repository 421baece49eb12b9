use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use wc_api_types::SelectionState;
use wc_catalog::Catalog;

use crate::{Compressor, KeyValueStore, Result, StorageError};

/// 4.5 MiB, measured on the serialized vehicle and wheel payloads combined.
pub const DEFAULT_QUOTA_BYTES: usize = 4_718_592;

pub mod keys {
    pub const VEHICLE_DATA: &str = "vehicleData";
    pub const WHEEL_DATA: &str = "wheelData";
    pub const LAST_DATA_REFRESH: &str = "lastDataRefresh";
    pub const LAST_CONFIG: &str = "lastConfig";

    pub fn compressed(key: &str) -> String {
        format!("{key}_compressed")
    }

    pub fn compressed_flag(key: &str) -> String {
        format!("{key}_isCompressed")
    }
}

const COMPRESSED_FLAG_VALUE: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Plain,
    Compressed,
    /// Over quota while the compressor was not loaded; retried by
    /// [`CatalogPersistence::flush_pending`].
    Deferred,
}

struct PendingWrite {
    vehicles: String,
    wheels: String,
    refreshed_at_ms: u64,
}

enum WriteOp {
    Set(String, String),
    Remove(String),
}

impl WriteOp {
    fn key(&self) -> &str {
        match self {
            Self::Set(key, _) | Self::Remove(key) => key,
        }
    }
}

pub struct CatalogPersistence<S, C> {
    store: S,
    compressor: C,
    quota_bytes: usize,
    pending: Option<PendingWrite>,
}

impl<S: KeyValueStore, C: Compressor> CatalogPersistence<S, C> {
    pub fn new(store: S, compressor: C) -> Self {
        Self {
            store,
            compressor,
            quota_bytes: DEFAULT_QUOTA_BYTES,
            pending: None,
        }
    }

    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn quota_bytes(&self) -> usize {
        self.quota_bytes
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some()
    }

    /// Persists both collections and the refresh timestamp.
    ///
    /// Under quota the payloads are written as plain JSON and any compressed
    /// copies are removed. Over quota every payload is compressed before the
    /// first key is touched.
    pub fn save_catalog(&mut self, catalog: &Catalog, refreshed_at_ms: u64) -> Result<SaveOutcome> {
        let vehicles = serde_json::to_string(&catalog.vehicles)
            .map_err(|source| StorageError::Encode { what: "vehicles", source })?;
        let wheels = serde_json::to_string(&catalog.wheels)
            .map_err(|source| StorageError::Encode { what: "wheels", source })?;

        // a newer save supersedes anything still waiting on the compressor
        self.pending = None;

        let total = vehicles.len() + wheels.len();
        if total <= self.quota_bytes {
            self.write_plain(vehicles, wheels, refreshed_at_ms)?;
            debug!("catalog stored uncompressed ({total} bytes)");
            return Ok(SaveOutcome::Plain);
        }

        info!(
            "catalog payload {total} bytes exceeds quota {}; compressing",
            self.quota_bytes
        );
        let write = PendingWrite {
            vehicles,
            wheels,
            refreshed_at_ms,
        };

        if !self.compressor.is_available() {
            warn!("compressor not loaded yet; deferring catalog save");
            self.pending = Some(write);
            return Ok(SaveOutcome::Deferred);
        }

        self.write_compressed(write)
    }

    /// Retries a deferred save exactly once. `Ok(None)` when nothing was pending.
    pub fn flush_pending(&mut self) -> Result<Option<SaveOutcome>> {
        let Some(write) = self.pending.take() else {
            return Ok(None);
        };

        if !self.compressor.is_available() {
            return Err(StorageError::LimitExceeded {
                reason: "compressor still unavailable after retry".into(),
            });
        }

        self.write_compressed(write).map(Some)
    }

    fn write_plain(&mut self, vehicles: String, wheels: String, refreshed_at_ms: u64) -> Result<()> {
        let ops = vec![
            WriteOp::Set(keys::VEHICLE_DATA.into(), vehicles),
            WriteOp::Remove(keys::compressed(keys::VEHICLE_DATA)),
            WriteOp::Remove(keys::compressed_flag(keys::VEHICLE_DATA)),
            WriteOp::Set(keys::WHEEL_DATA.into(), wheels),
            WriteOp::Remove(keys::compressed(keys::WHEEL_DATA)),
            WriteOp::Remove(keys::compressed_flag(keys::WHEEL_DATA)),
            WriteOp::Set(keys::LAST_DATA_REFRESH.into(), refreshed_at_ms.to_string()),
        ];
        self.apply(ops).map_err(into_limit_exceeded)
    }

    fn write_compressed(&mut self, write: PendingWrite) -> Result<SaveOutcome> {
        let vehicles = self
            .compressor
            .compress(&write.vehicles)
            .map_err(|err| StorageError::LimitExceeded {
                reason: format!("vehicle compression failed: {err}"),
            })?;
        let wheels = self
            .compressor
            .compress(&write.wheels)
            .map_err(|err| StorageError::LimitExceeded {
                reason: format!("wheel compression failed: {err}"),
            })?;

        info!(
            "compressed catalog from {} to {} bytes",
            write.vehicles.len() + write.wheels.len(),
            vehicles.len() + wheels.len()
        );

        let ops = vec![
            WriteOp::Set(keys::compressed(keys::VEHICLE_DATA), vehicles),
            WriteOp::Set(
                keys::compressed_flag(keys::VEHICLE_DATA),
                COMPRESSED_FLAG_VALUE.into(),
            ),
            WriteOp::Remove(keys::VEHICLE_DATA.into()),
            WriteOp::Set(keys::compressed(keys::WHEEL_DATA), wheels),
            WriteOp::Set(
                keys::compressed_flag(keys::WHEEL_DATA),
                COMPRESSED_FLAG_VALUE.into(),
            ),
            WriteOp::Remove(keys::WHEEL_DATA.into()),
            WriteOp::Set(
                keys::LAST_DATA_REFRESH.into(),
                write.refreshed_at_ms.to_string(),
            ),
        ];
        self.apply(ops).map_err(into_limit_exceeded)?;
        Ok(SaveOutcome::Compressed)
    }

    /// Applies `ops` in order; on the first failure every applied op is undone.
    fn apply(&mut self, ops: Vec<WriteOp>) -> Result<()> {
        let mut undo: Vec<(String, Option<String>)> = Vec::with_capacity(ops.len());

        for op in ops {
            let previous = self.store.get(op.key());
            let result = match &op {
                WriteOp::Set(key, value) => self.store.set(key, value),
                WriteOp::Remove(key) => self.store.remove(key),
            };
            if let Err(err) = result {
                self.rollback(undo);
                return Err(err);
            }
            undo.push((op.key().to_owned(), previous));
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Vec<(String, Option<String>)>) {
        for (key, previous) in undo.into_iter().rev() {
            let restored = match previous {
                Some(value) => self.store.set(&key, &value),
                None => self.store.remove(&key),
            };
            if let Err(err) = restored {
                warn!("rollback of {key} failed: {err}");
            }
        }
    }

    /// Loads both collections. A collection with no stored entry falls back to
    /// its built-in default.
    pub fn load_catalog(&self) -> Result<Catalog> {
        let vehicles = self
            .load_collection(keys::VEHICLE_DATA)?
            .unwrap_or_else(Catalog::builtin_vehicles);
        let wheels = self
            .load_collection(keys::WHEEL_DATA)?
            .unwrap_or_else(Catalog::builtin_wheels);
        Ok(Catalog::new(vehicles, wheels))
    }

    /// Like [`Self::load_catalog`], replacing the whole catalog with the
    /// built-in one on any failure.
    pub fn load_catalog_or_builtin(&self) -> Catalog {
        match self.load_catalog() {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!("stored catalog unreadable, using built-in data: {err}");
                Catalog::builtin()
            }
        }
    }

    fn load_collection<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Vec<T>>> {
        let flagged = self.store.get(&keys::compressed_flag(key)).as_deref()
            == Some(COMPRESSED_FLAG_VALUE);

        let raw = match (flagged, self.store.get(&keys::compressed(key))) {
            (true, Some(packed)) => {
                if !self.compressor.is_available() {
                    return Err(StorageError::CompressionUnavailable);
                }
                self.compressor
                    .decompress(&packed)
                    .map_err(|source| StorageError::Decompress {
                        key: key.to_owned(),
                        source,
                    })?
            }
            _ => match self.store.get(key) {
                Some(raw) => raw,
                None => return Ok(None),
            },
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Decode {
                key: key.to_owned(),
                source,
            })
    }

    /// Epoch milliseconds of the last successful catalog save.
    pub fn last_refresh(&self) -> Option<u64> {
        self.store
            .get(keys::LAST_DATA_REFRESH)
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn save_last_config(&mut self, state: &SelectionState) -> Result<()> {
        let raw = serde_json::to_string(state)
            .map_err(|source| StorageError::Encode { what: "selection", source })?;
        self.store.set(keys::LAST_CONFIG, &raw)
    }

    /// The persisted selection; `None` when absent or unparseable.
    pub fn load_last_config(&self) -> Option<SelectionState> {
        let raw = self.store.get(keys::LAST_CONFIG)?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!("ignoring unreadable {}: {err}", keys::LAST_CONFIG);
                None
            }
        }
    }
}

fn into_limit_exceeded(err: StorageError) -> StorageError {
    match err {
        StorageError::QuotaExceeded { key, bytes } => StorageError::LimitExceeded {
            reason: format!("store rejected {bytes} bytes for {key}"),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompressionError, InMemoryStore, NoCompression};
    use std::cell::Cell;
    use std::rc::Rc;
    use wc_api_types::{Vehicle, Wheel};

    /// Reversible stand-in codec whose availability can flip mid-test.
    #[derive(Clone, Default)]
    struct ToggleCodec {
        available: Rc<Cell<bool>>,
        broken: bool,
    }

    impl Compressor for ToggleCodec {
        fn is_available(&self) -> bool {
            self.available.get()
        }

        fn compress(&self, text: &str) -> std::result::Result<String, CompressionError> {
            if self.broken {
                return Err(CompressionError::Codec("boom".into()));
            }
            Ok(text.chars().rev().collect())
        }

        fn decompress(&self, packed: &str) -> std::result::Result<String, CompressionError> {
            Ok(packed.chars().rev().collect())
        }
    }

    fn available_codec() -> ToggleCodec {
        let codec = ToggleCodec::default();
        codec.available.set(true);
        codec
    }

    fn big_catalog(target_bytes: usize) -> Catalog {
        // every record carries at least 1 KiB of image url
        let filler = "x".repeat(1024);
        let mut catalog = Catalog::builtin();
        catalog
            .vehicles
            .extend((0..=target_bytes / 1024).map(|index| Vehicle {
                year: "2024".into(),
                make: "Subaru".into(),
                model: format!("Model {index}"),
                color: "Ignition Red".into(),
                image: format!("https://img.example/{index}/{filler}"),
                ..Vehicle::default()
            }));
        catalog
    }

    #[test]
    fn small_catalog_round_trips_uncompressed() {
        let mut persistence = CatalogPersistence::new(InMemoryStore::new(), NoCompression);
        let catalog = Catalog::builtin();

        let outcome = persistence.save_catalog(&catalog, 1_700_000_000_000).unwrap();
        assert_eq!(outcome, SaveOutcome::Plain);
        assert_eq!(persistence.load_catalog().unwrap(), catalog);
        assert_eq!(persistence.last_refresh(), Some(1_700_000_000_000));
        assert!(!persistence.store().contains_key("vehicleData_isCompressed"));
    }

    #[test]
    fn over_quota_payload_is_stored_compressed() {
        let mut persistence =
            CatalogPersistence::new(InMemoryStore::new(), available_codec()).with_quota(64);
        let catalog = Catalog::builtin();

        let outcome = persistence.save_catalog(&catalog, 5).unwrap();
        assert_eq!(outcome, SaveOutcome::Compressed);

        let store = persistence.store();
        assert_eq!(store.get("vehicleData_isCompressed").as_deref(), Some("true"));
        assert_eq!(store.get("wheelData_isCompressed").as_deref(), Some("true"));
        assert!(!store.contains_key("vehicleData"));
        assert!(!store.contains_key("wheelData"));
        assert_eq!(persistence.load_catalog().unwrap(), catalog);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn five_megabyte_catalog_replaces_plain_copy_with_zstd() {
        let mut persistence =
            CatalogPersistence::new(InMemoryStore::new(), crate::ZstdCompressor::default());
        persistence.save_catalog(&Catalog::builtin(), 1).unwrap();
        assert!(persistence.store().contains_key("vehicleData"));

        let catalog = big_catalog(5 * 1024 * 1024);
        let outcome = persistence.save_catalog(&catalog, 2).unwrap();

        assert_eq!(outcome, SaveOutcome::Compressed);
        let store = persistence.store();
        assert_eq!(store.get("vehicleData_isCompressed").as_deref(), Some("true"));
        assert!(!store.contains_key("vehicleData"));
        assert!(store.bytes_used() < DEFAULT_QUOTA_BYTES);
        assert_eq!(persistence.load_catalog().unwrap(), catalog);
    }

    #[test]
    fn plain_save_clears_stale_compressed_copies() {
        let codec = available_codec();
        let mut persistence = CatalogPersistence::new(InMemoryStore::new(), codec).with_quota(64);
        persistence.save_catalog(&Catalog::builtin(), 1).unwrap();

        let mut persistence = CatalogPersistence::new(
            std::mem::take(persistence.store_mut()),
            available_codec(),
        );
        let small = Catalog::new(Catalog::builtin_vehicles(), Vec::new());
        assert_eq!(persistence.save_catalog(&small, 2).unwrap(), SaveOutcome::Plain);

        let store = persistence.store();
        assert!(!store.contains_key("wheelData_compressed"));
        assert!(!store.contains_key("wheelData_isCompressed"));
        assert!(persistence.load_catalog().unwrap().wheels.is_empty());
    }

    #[test]
    fn save_without_compressor_is_deferred_then_flushed() {
        let codec = ToggleCodec::default();
        let mut persistence =
            CatalogPersistence::new(InMemoryStore::new(), codec.clone()).with_quota(64);

        let outcome = persistence.save_catalog(&Catalog::builtin(), 9).unwrap();
        assert_eq!(outcome, SaveOutcome::Deferred);
        assert!(persistence.has_pending_write());
        assert!(persistence.store().is_empty());

        codec.available.set(true);
        assert_eq!(persistence.flush_pending().unwrap(), Some(SaveOutcome::Compressed));
        assert!(!persistence.has_pending_write());
        assert_eq!(persistence.last_refresh(), Some(9));
        assert_eq!(persistence.flush_pending().unwrap(), None);
    }

    #[test]
    fn retry_with_compressor_still_missing_is_fatal() {
        let mut persistence =
            CatalogPersistence::new(InMemoryStore::new(), ToggleCodec::default()).with_quota(64);
        persistence.save_catalog(&Catalog::builtin(), 9).unwrap();

        let err = persistence.flush_pending().unwrap_err();
        assert!(matches!(err, StorageError::LimitExceeded { .. }));
        assert!(!persistence.has_pending_write());
    }

    #[test]
    fn failing_codec_leaves_previous_data_intact() {
        let mut persistence = CatalogPersistence::new(InMemoryStore::new(), available_codec());
        persistence.save_catalog(&Catalog::builtin(), 1).unwrap();

        let broken = ToggleCodec {
            broken: true,
            ..available_codec()
        };
        let mut persistence =
            CatalogPersistence::new(std::mem::take(persistence.store_mut()), broken).with_quota(64);

        let err = persistence.save_catalog(&big_catalog(4096), 2).unwrap_err();
        assert!(matches!(err, StorageError::LimitExceeded { .. }));
        assert_eq!(persistence.load_catalog().unwrap(), Catalog::builtin());
        assert_eq!(persistence.last_refresh(), Some(1));
    }

    #[test]
    fn rejected_write_is_rolled_back() {
        let mut persistence =
            CatalogPersistence::new(InMemoryStore::with_capacity(16 * 1024), NoCompression);
        persistence.save_catalog(&Catalog::builtin(), 1).unwrap();
        let before = persistence.store().clone();

        // vehicles fit the store, wheels do not
        let mut catalog = Catalog::builtin();
        catalog.wheels[0].wheel_image = "w".repeat(32 * 1024);

        let err = persistence.save_catalog(&catalog, 2).unwrap_err();
        assert!(matches!(err, StorageError::LimitExceeded { .. }));
        for key in ["vehicleData", "wheelData", "lastDataRefresh"] {
            assert_eq!(persistence.store().get(key), before.get(key), "{key}");
        }
    }

    #[test]
    fn corrupt_payload_falls_back_to_builtin_catalog() {
        let mut store = InMemoryStore::new();
        store.set("vehicleData", "[{not json").unwrap();
        store
            .set("wheelData", &serde_json::to_string(&Vec::<Wheel>::new()).unwrap())
            .unwrap();
        let persistence = CatalogPersistence::new(store, NoCompression);

        assert!(matches!(
            persistence.load_catalog(),
            Err(StorageError::Decode { .. })
        ));
        assert_eq!(persistence.load_catalog_or_builtin(), Catalog::builtin());
    }

    #[test]
    fn compressed_flag_without_codec_is_unavailable() {
        let mut store = InMemoryStore::new();
        store.set("vehicleData_compressed", "packed").unwrap();
        store.set("vehicleData_isCompressed", "true").unwrap();
        let persistence = CatalogPersistence::new(store, NoCompression);

        assert!(matches!(
            persistence.load_catalog(),
            Err(StorageError::CompressionUnavailable)
        ));
        assert_eq!(persistence.load_catalog_or_builtin(), Catalog::builtin());
    }

    #[test]
    fn missing_collection_uses_its_default() {
        let mut store = InMemoryStore::new();
        store.set("wheelData", "[]").unwrap();
        let persistence = CatalogPersistence::new(store, NoCompression);

        let catalog = persistence.load_catalog().unwrap();
        assert_eq!(catalog.vehicles, Catalog::builtin_vehicles());
        assert!(catalog.wheels.is_empty());
    }

    #[test]
    fn last_config_round_trips_and_ignores_garbage() {
        let mut persistence = CatalogPersistence::new(InMemoryStore::new(), NoCompression);
        assert!(persistence.load_last_config().is_none());

        let mut state = SelectionState::default();
        state.vehicle.model = "WRX VB".into();
        state.wheel.model = "TR10".into();
        persistence.save_last_config(&state).unwrap();
        assert_eq!(persistence.load_last_config(), Some(state));

        persistence.store_mut().set("lastConfig", "{oops").unwrap();
        assert!(persistence.load_last_config().is_none());
    }
}
