//! Vehicle and wheel catalog.
//!
//! Holds the two flat collections, the built-in fallback data, the tabular
//! decoders used by every catalog source, and the derived compatibility index.

mod defaults;
pub mod index;
pub mod table;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use wc_api_types::{Vehicle, Wheel};

pub use index::CompatibilityIndex;
pub use table::Table;

/// Vehicles and wheels as loaded from one source. Replaced wholesale on refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub vehicles: Vec<Vehicle>,
    pub wheels: Vec<Wheel>,
}

impl Catalog {
    pub fn new(vehicles: Vec<Vehicle>, wheels: Vec<Wheel>) -> Self {
        Self { vehicles, wheels }
    }

    /// Built-in catalog used when nothing usable is stored.
    pub fn builtin() -> Self {
        Self {
            vehicles: defaults::vehicles(),
            wheels: defaults::wheels(),
        }
    }

    pub fn builtin_vehicles() -> Vec<Vehicle> {
        defaults::vehicles()
    }

    pub fn builtin_wheels() -> Vec<Wheel> {
        defaults::wheels()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.wheels.is_empty()
    }

    /// Distinct years, newest first.
    pub fn years(&self) -> Vec<String> {
        let years: BTreeSet<&str> = self.vehicles.iter().map(|v| v.year.as_str()).collect();
        years.into_iter().rev().map(str::to_owned).collect()
    }

    /// Distinct makes offered for `year`, sorted.
    pub fn makes(&self, year: &str) -> Vec<String> {
        let makes: BTreeSet<&str> = self
            .vehicles
            .iter()
            .filter(|v| v.year == year)
            .map(|v| v.make.as_str())
            .collect();
        makes.into_iter().map(str::to_owned).collect()
    }

    /// Distinct models offered for `year` and `make`, sorted.
    pub fn models(&self, year: &str, make: &str) -> Vec<String> {
        let models: BTreeSet<&str> = self
            .vehicles
            .iter()
            .filter(|v| v.year == year && v.make == make)
            .map(|v| v.model.as_str())
            .collect();
        models.into_iter().map(str::to_owned).collect()
    }

    /// Exact lookup on the full vehicle identity.
    pub fn vehicle(&self, year: &str, make: &str, model: &str, color: &str) -> Option<&Vehicle> {
        self.vehicles
            .iter()
            .find(|v| v.year == year && v.make == make && v.model == model && v.color == color)
    }

    /// First record for (year, make, model) in any colour.
    pub fn any_color(&self, year: &str, make: &str, model: &str) -> Option<&Vehicle> {
        self.vehicles
            .iter()
            .find(|v| v.year == year && v.make == make && v.model == model)
    }

    pub fn build_index(&self) -> CompatibilityIndex {
        CompatibilityIndex::build(&self.wheels)
    }
}

/// `Sync` on native targets, where sources are shared across tasks; no bound
/// on wasm32.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSync: Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Sync + ?Sized> MaybeSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSync {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSync for T {}

/// Where a fresh catalog comes from (a spreadsheet API, a CSV export, ...).
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait CatalogSource: MaybeSync {
    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>>;
    async fn fetch_wheels(&self) -> Result<Vec<Wheel>>;

    async fn fetch_catalog(&self) -> Result<Catalog> {
        let vehicles = self.fetch_vehicles().await?;
        let wheels = self.fetch_wheels().await?;
        Ok(Catalog { vehicles, wheels })
    }
}

/// Catalog source backed by two CSV documents already in memory.
pub struct CsvCatalogSource {
    vehicles_csv: String,
    wheels_csv: String,
}

impl CsvCatalogSource {
    pub fn new(vehicles_csv: impl Into<String>, wheels_csv: impl Into<String>) -> Self {
        Self {
            vehicles_csv: vehicles_csv.into(),
            wheels_csv: wheels_csv.into(),
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl CatalogSource for CsvCatalogSource {
    async fn fetch_vehicles(&self) -> Result<Vec<Vehicle>> {
        Ok(table::decode_vehicles(&Table::from_csv(&self.vehicles_csv)))
    }

    async fn fetch_wheels(&self) -> Result<Vec<Wheel>> {
        Ok(table::decode_wheels(&Table::from_csv(&self.wheels_csv)))
    }
}
