//! Wheel configurator browser bindings.
//!
//! Exposes [`WheelConfigurator`] to the page. Selection logic lives in
//! `wc-configurator-core`; this crate supplies the browser pieces it needs:
//! `localStorage`, the LZString codec and image preloading.

pub mod app;
pub mod lz;
pub mod preload;
pub mod storage;

pub use app::WheelConfigurator;

use wasm_bindgen::prelude::*;

/// WASM entry point, called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}
