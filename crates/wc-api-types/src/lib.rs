use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One paint colour of one vehicle. Several records share (year, make, model).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub year: String,
    pub make: String,
    pub model: String,
    pub color: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub swatch: String,
    #[serde(default)]
    pub lower_image: String,
}

impl Vehicle {
    pub fn has_lower_image(&self) -> bool {
        !self.lower_image.trim().is_empty()
    }
}

/// One finish of one wheel model.
///
/// `vehicle_wheel_images` is keyed by the same vehicle-model strings listed in
/// `compatible_vehicles`; a key may map to an empty string when no art exists yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wheel {
    pub brand: String,
    pub model: String,
    pub finish: String,
    #[serde(default)]
    pub wheel_image: String,
    #[serde(default)]
    pub swatch: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub compatible_vehicles: Vec<String>,
    #[serde(default)]
    pub vehicle_wheel_images: BTreeMap<String, String>,
}

impl Wheel {
    pub fn fits(&self, vehicle_model: &str) -> bool {
        self.compatible_vehicles.iter().any(|v| v == vehicle_model)
    }

    /// Overlay art for `vehicle_model`; `None` when missing or empty.
    pub fn overlay_for(&self, vehicle_model: &str) -> Option<&str> {
        self.vehicle_wheel_images
            .get(vehicle_model)
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSelection {
    pub year: String,
    pub make: String,
    pub model: String,
    pub color: String,
    #[serde(default)]
    pub is_lowered: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelSelection {
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub finish: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub current_page: usize,
    pub items_per_page: usize,
    pub total_pages: usize,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: 1,
            items_per_page: 8,
            total_pages: 1,
        }
    }
}

/// The single mutable selection. Persisted under `lastConfig` on unload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub vehicle: VehicleSelection,
    pub wheel: WheelSelection,
    #[serde(default)]
    pub pagination: PaginationState,
    #[serde(default)]
    pub is_loading: bool,
}

// ── Token endpoint wire types ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub client_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TokenErrorResponse {
    pub fn describe(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("Unknown error")
    }
}

/// Body of a spreadsheet values read. Row 0 holds the headers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetValueRange {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<String>>,
}

/// Milliseconds since the Unix epoch.
#[cfg(not(target_arch = "wasm32"))]
pub fn epoch_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Milliseconds since the Unix epoch.
#[cfg(target_arch = "wasm32")]
pub fn epoch_ms() -> u64 {
    js_sys::Date::now() as u64
}
