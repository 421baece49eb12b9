//! Selection logic of the wheel configurator.
//!
//! [`Configurator`] owns the catalog, the compatibility index and the single
//! [`SelectionState`](wc_api_types::SelectionState). Hosts call its operations
//! from UI events, start the image preloads it hands out, and render the
//! [`ViewModel`] it derives.

mod controller;
pub mod images;
pub mod matching;
pub mod pagination;
pub mod refresh;
pub mod resolver;
pub mod view;

use serde::{Deserialize, Serialize};
use wc_storage::StorageError;

pub use controller::Configurator;
pub use images::{ImageCompletion, ImageSlot, ImageStatus, ImageTicket};
pub use refresh::{AutoRefreshPolicy, CatalogRefresher};
pub use resolver::Resolver;
pub use view::{ViewModel, derive_view};

/// Virtual house brand that presents every catalog brand together.
pub const DEFAULT_PINNED_BRAND: &str = "W+1 Chrome Factory";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfiguratorConfig {
    /// `None` disables aggregation; wheels are then filtered by their own brand.
    pub pinned_brand: Option<String>,
    pub page_size: usize,
}

impl Default for ConfiguratorConfig {
    fn default() -> Self {
        Self {
            pinned_brand: Some(DEFAULT_PINNED_BRAND.to_string()),
            page_size: pagination::DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfiguratorError {
    #[error("vehicle {year} {make} {model} is not in the catalog")]
    VehicleNotFound {
        year: String,
        make: String,
        model: String,
    },
    #[error("paint colour {0} is not offered for this vehicle")]
    UnknownColor(String),
    #[error("brand {0} has no wheels for this vehicle")]
    UnknownBrand(String),
    #[error("wheel model {0} does not fit this vehicle")]
    UnknownWheelModel(String),
    #[error("finish {0} is not available for this wheel")]
    UnknownFinish(String),
    #[error("a catalog refresh is already running")]
    RefreshInFlight,
    #[error("catalog fetch failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
