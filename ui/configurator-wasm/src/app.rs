//! The handle exported to the page.
//!
//! All state lives in one `Rc<RefCell<Shared>>` (WASM is single-threaded).
//! Borrows are never held across an `.await` or a call back into JS.

use gloo_console::{error, info, log, warn};
use gloo_timers::callback::Interval;
use serde::Deserialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wc_api_types::epoch_ms;
use wc_configurator_core::refresh::{DEFAULT_AUTO_REFRESH_MS, install_refreshed};
use wc_configurator_core::{
    AutoRefreshPolicy, CatalogRefresher, Configurator, ConfiguratorConfig, ConfiguratorError,
};
use wc_sheets_client::{SheetsClient, SheetsConfig};
use wc_storage::{CatalogPersistence, SaveOutcome};

use crate::lz::LzStringCompressor;
use crate::preload;
use crate::storage::LocalStorageStore;

pub(crate) struct Shared {
    pub(crate) configurator: Configurator,
    persistence: CatalogPersistence<LocalStorageStore, LzStringCompressor>,
    on_change: Option<js_sys::Function>,
}

/// Options accepted by the `WheelConfigurator` constructor. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Options {
    #[serde(flatten)]
    config: ConfiguratorConfig,
    token_endpoint: Option<String>,
    client_email: Option<String>,
    vehicle_sheet_id: Option<String>,
    vehicle_range: Option<String>,
    wheel_sheet_id: Option<String>,
    wheel_range: Option<String>,
    sheets_api_base: Option<String>,
    auto_refresh_ms: Option<u64>,
}

impl Options {
    fn sheets(&self) -> SheetsConfig {
        SheetsConfig::from_lookup(|name| {
            let value = match name {
                "WC_TOKEN_ENDPOINT" => &self.token_endpoint,
                "WC_CLIENT_EMAIL" => &self.client_email,
                "WC_VEHICLE_SHEET_ID" => &self.vehicle_sheet_id,
                "WC_VEHICLE_RANGE" => &self.vehicle_range,
                "WC_WHEEL_SHEET_ID" => &self.wheel_sheet_id,
                "WC_WHEEL_RANGE" => &self.wheel_range,
                "WC_SHEETS_API_BASE" => &self.sheets_api_base,
                _ => return None,
            };
            value.clone()
        })
    }
}

/// Calls the registered change listener, if any.
pub(crate) fn notify(shared: &Rc<RefCell<Shared>>) {
    let callback = shared.borrow().on_change.clone();
    if let Some(callback) = callback {
        if let Err(err) = callback.call0(&JsValue::NULL) {
            error!("change listener threw", err);
        }
    }
}

fn to_js(err: ConfiguratorError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct WheelConfigurator {
    shared: Rc<RefCell<Shared>>,
    refresher: Rc<CatalogRefresher<SheetsClient>>,
    policy: AutoRefreshPolicy,
    sheets_ready: bool,
    auto_refresh: Option<Interval>,
}

#[wasm_bindgen]
impl WheelConfigurator {
    /// Loads the stored catalog (or the built-in one), restores the last
    /// configuration and starts the image preloads.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<WheelConfigurator, JsValue> {
        let options: Options = if options.is_undefined() || options.is_null() {
            Options::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };

        let sheets = options.sheets();
        let sheets_ready = match sheets.validate() {
            Ok(()) => true,
            Err(err) => {
                warn!(format!("{err:#}; remote refresh disabled"));
                false
            }
        };

        let persistence = CatalogPersistence::new(LocalStorageStore::open(), LzStringCompressor);
        let catalog = persistence.load_catalog_or_builtin();
        let saved = persistence.load_last_config();

        let mut configurator = Configurator::new(catalog, options.config.clone());
        if !configurator.restore(saved) {
            log!("no usable saved configuration; starting from defaults");
        }

        let shared = Rc::new(RefCell::new(Shared {
            configurator,
            persistence,
            on_change: None,
        }));
        preload::start(&shared);
        save_on_unload(&shared)?;

        Ok(WheelConfigurator {
            shared,
            refresher: Rc::new(CatalogRefresher::new(SheetsClient::new(sheets))),
            policy: AutoRefreshPolicy::new(options.auto_refresh_ms.unwrap_or(DEFAULT_AUTO_REFRESH_MS)),
            sheets_ready,
            auto_refresh: None,
        })
    }

    /// Registers a zero-argument callback run after every visible change.
    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: js_sys::Function) {
        self.shared.borrow_mut().on_change = Some(callback);
    }

    /// The derived view model as a plain JS object.
    pub fn view(&self) -> Result<JsValue, JsValue> {
        let view = self.shared.borrow().configurator.view();
        Ok(serde_wasm_bindgen::to_value(&view)?)
    }

    #[wasm_bindgen(js_name = applyVehicle)]
    pub fn apply_vehicle(&self, year: &str, make: &str, model: &str) -> Result<(), JsValue> {
        self.mutate(|c| c.apply_vehicle(year, make, model))
    }

    #[wasm_bindgen(js_name = selectColor)]
    pub fn select_color(&self, color: &str) -> Result<(), JsValue> {
        self.mutate(|c| c.select_color(color))
    }

    #[wasm_bindgen(js_name = selectBrand)]
    pub fn select_brand(&self, brand: &str) -> Result<(), JsValue> {
        self.mutate(|c| c.select_brand(brand))
    }

    #[wasm_bindgen(js_name = selectModel)]
    pub fn select_model(&self, model: &str) -> Result<(), JsValue> {
        self.mutate(|c| c.select_model(model))
    }

    #[wasm_bindgen(js_name = selectFinish)]
    pub fn select_finish(&self, finish: &str) -> Result<(), JsValue> {
        self.mutate(|c| c.select_finish(finish))
    }

    /// Returns whether the stance changed; lowering is refused without lowered art.
    #[wasm_bindgen(js_name = toggleLowered)]
    pub fn toggle_lowered(&self) -> bool {
        self.step(Configurator::toggle_lowered)
    }

    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&self) -> bool {
        self.step(Configurator::next_page)
    }

    #[wasm_bindgen(js_name = previousPage)]
    pub fn previous_page(&self) -> bool {
        self.step(Configurator::previous_page)
    }

    #[wasm_bindgen(js_name = setPage)]
    pub fn set_page(&self, page: usize) -> bool {
        self.step(|c| c.set_page(page))
    }

    /// Writes the current selection under `lastConfig`.
    #[wasm_bindgen(js_name = saveConfig)]
    pub fn save_config(&self) -> Result<(), JsValue> {
        save_last_config(&self.shared).map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Retries a catalog save that waited for the LZString script. Call once
    /// the script has loaded.
    #[wasm_bindgen(js_name = compressorReady)]
    pub fn compressor_ready(&self) -> Result<bool, JsValue> {
        let flushed = self
            .shared
            .borrow_mut()
            .persistence
            .flush_pending()
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(flushed.is_some())
    }

    /// Pulls the catalog from the spreadsheet. Resolves to `true` when a new
    /// catalog was installed; a refresh already in flight resolves to `false`.
    /// Rejects when the fetch fails or the catalog cannot be stored.
    pub fn refresh(&self) -> js_sys::Promise {
        let shared = self.shared.clone();
        let refresher = self.refresher.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            run_refresh(&shared, &refresher)
                .await
                .map(JsValue::from_bool)
                .map_err(to_js)
        })
    }

    /// Starts the periodic refresh and, when the stored data is older than one
    /// interval, refreshes right away. No-op when the interval is under a minute
    /// or no spreadsheet is configured.
    #[wasm_bindgen(js_name = startAutoRefresh)]
    pub fn start_auto_refresh(&mut self) {
        let Some(period) = self.policy.interval().filter(|_| self.sheets_ready) else {
            info!("auto refresh disabled");
            return;
        };

        let last_refresh = self.shared.borrow().persistence.last_refresh();
        if self.policy.is_due(last_refresh, epoch_ms()) {
            self.spawn_refresh();
        }

        let shared = self.shared.clone();
        let refresher = self.refresher.clone();
        let policy = self.policy;
        let millis = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
        self.auto_refresh = Some(Interval::new(millis, move || {
            let is_loading = shared.borrow().configurator.state().is_loading;
            if !policy.should_run(is_loading, refresher.is_refreshing()) {
                return;
            }
            let shared = shared.clone();
            let refresher = refresher.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(err) = run_refresh(&shared, &refresher).await {
                    warn!(format!("auto refresh failed: {err}"));
                }
            });
        }));
    }

    #[wasm_bindgen(js_name = stopAutoRefresh)]
    pub fn stop_auto_refresh(&mut self) {
        if let Some(interval) = self.auto_refresh.take() {
            interval.cancel();
        }
    }

    fn spawn_refresh(&self) {
        let shared = self.shared.clone();
        let refresher = self.refresher.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(err) = run_refresh(&shared, &refresher).await {
                warn!(format!("catalog refresh failed: {err}"));
            }
        });
    }

    fn mutate(
        &self,
        action: impl FnOnce(&mut Configurator) -> Result<(), ConfiguratorError>,
    ) -> Result<(), JsValue> {
        let result = action(&mut self.shared.borrow_mut().configurator);
        preload::start(&self.shared);
        notify(&self.shared);
        result.map_err(to_js)
    }

    fn step(&self, action: impl FnOnce(&mut Configurator) -> bool) -> bool {
        let changed = action(&mut self.shared.borrow_mut().configurator);
        if changed {
            preload::start(&self.shared);
            notify(&self.shared);
        }
        changed
    }
}

async fn run_refresh(
    shared: &Rc<RefCell<Shared>>,
    refresher: &CatalogRefresher<SheetsClient>,
) -> Result<bool, ConfiguratorError> {
    if refresher.is_refreshing() {
        return Ok(false);
    }

    shared.borrow_mut().configurator.set_loading(true);
    notify(shared);

    let result = refresher.refresh().await;

    let installed = match result {
        Ok(catalog) => {
            let mut guard = shared.borrow_mut();
            let Shared {
                configurator,
                persistence,
                ..
            } = &mut *guard;
            match install_refreshed(configurator, persistence, catalog, epoch_ms()) {
                Ok(SaveOutcome::Deferred) => {
                    info!("catalog save waits for the compression script");
                    Ok(true)
                }
                Ok(_) => Ok(true),
                Err(err) => {
                    error!(format!("refreshed catalog discarded: {err}"));
                    Err(err)
                }
            }
        }
        Err(ConfiguratorError::RefreshInFlight) => Ok(false),
        Err(err) => Err(err),
    };

    shared.borrow_mut().configurator.set_loading(false);
    preload::start(shared);
    notify(shared);
    installed
}

fn save_last_config(shared: &Rc<RefCell<Shared>>) -> Result<(), wc_storage::StorageError> {
    let mut guard = shared.borrow_mut();
    let snapshot = guard.configurator.snapshot();
    guard.persistence.save_last_config(&snapshot)
}

fn save_on_unload(shared: &Rc<RefCell<Shared>>) -> Result<(), JsValue> {
    let shared = shared.clone();
    let callback = Closure::wrap(Box::new(move |_: web_sys::Event| {
        if let Err(err) = save_last_config(&shared) {
            error!(format!("failed to save configuration: {err}"));
        }
    }) as Box<dyn FnMut(_)>);
    gloo_utils::window()
        .add_event_listener_with_callback("beforeunload", callback.as_ref().unchecked_ref())?;
    callback.forget();
    Ok(())
}
