use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use wc_catalog::{Catalog, CatalogSource};
use wc_storage::{CatalogPersistence, Compressor, KeyValueStore, SaveOutcome};

use crate::{Configurator, ConfiguratorError};

/// Shorter intervals switch auto refresh off.
pub const MIN_AUTO_REFRESH_MS: u64 = 60_000;
pub const DEFAULT_AUTO_REFRESH_MS: u64 = 3_600_000;

/// Pulls a fresh catalog from a [`CatalogSource`], one fetch at a time.
///
/// A refresh requested while another is running is dropped, not queued.
pub struct CatalogRefresher<S> {
    source: S,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: CatalogSource> CatalogRefresher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Fetches both collections. On error nothing is returned, so the cached
    /// catalog stays as it was.
    pub async fn refresh(&self) -> Result<Catalog, ConfiguratorError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("refresh already running; dropping request");
            return Err(ConfiguratorError::RefreshInFlight);
        };

        let catalog = self.source.fetch_catalog().await.map_err(|err| {
            warn!("catalog refresh failed: {err:#}");
            ConfiguratorError::Fetch(err)
        })?;

        info!(
            "fetched {} vehicles and {} wheels",
            catalog.vehicles.len(),
            catalog.wheels.len()
        );
        Ok(catalog)
    }
}

/// Saves a refreshed catalog and logs how much of the store it now occupies.
pub fn persist_refreshed<K, C>(
    persistence: &mut CatalogPersistence<K, C>,
    catalog: &Catalog,
    refreshed_at_ms: u64,
) -> Result<SaveOutcome, ConfiguratorError>
where
    K: KeyValueStore,
    C: Compressor,
{
    let outcome = persistence.save_catalog(catalog, refreshed_at_ms)?;
    let used = persistence.store().bytes_used();
    info!(
        "catalog saved ({outcome:?}); store holds {used} bytes, {:.1}% of quota",
        used as f64 * 100.0 / persistence.quota_bytes().max(1) as f64
    );
    Ok(outcome)
}

/// Saves a refreshed catalog and installs it once the save went through.
///
/// A failed save is fatal for the refresh: the configurator keeps the catalog
/// and selection it had. A save deferred until the compressor loads still
/// installs the new data.
pub fn install_refreshed<K, C>(
    configurator: &mut Configurator,
    persistence: &mut CatalogPersistence<K, C>,
    catalog: Catalog,
    refreshed_at_ms: u64,
) -> Result<SaveOutcome, ConfiguratorError>
where
    K: KeyValueStore,
    C: Compressor,
{
    let outcome = persist_refreshed(persistence, &catalog, refreshed_at_ms)?;
    configurator.replace_catalog(catalog);
    Ok(outcome)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoRefreshPolicy {
    interval_ms: u64,
}

impl Default for AutoRefreshPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_REFRESH_MS)
    }
}

impl AutoRefreshPolicy {
    pub fn new(interval_ms: u64) -> Self {
        Self { interval_ms }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_ms >= MIN_AUTO_REFRESH_MS
    }

    pub fn interval(&self) -> Option<Duration> {
        self.is_enabled()
            .then(|| Duration::from_millis(self.interval_ms))
    }

    /// Whether a timer tick should start a refresh.
    pub fn should_run(&self, is_loading: bool, is_refreshing: bool) -> bool {
        self.is_enabled() && !is_loading && !is_refreshing
    }

    /// Whether the data saved at `last_refresh_ms` is older than one interval.
    pub fn is_due(&self, last_refresh_ms: Option<u64>, now_ms: u64) -> bool {
        self.is_enabled()
            && last_refresh_ms.is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms)
    }
}
