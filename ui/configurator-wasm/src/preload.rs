//! Image preloading.
//!
//! Each ticket handed out by the configurator gets a detached
//! `HtmlImageElement`; its load or error event reports back through
//! [`Configurator::complete_image`](wc_configurator_core::Configurator::complete_image).

use gloo_console::warn;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wc_configurator_core::{ImageCompletion, ImageTicket};
use web_sys::HtmlImageElement;

use crate::app::{Shared, notify};

/// Starts every preload the configurator has queued.
pub(crate) fn start(shared: &Rc<RefCell<Shared>>) {
    let tickets = shared.borrow_mut().configurator.take_image_requests();
    for ticket in tickets {
        if let Err(err) = load(shared, ticket) {
            warn!("could not start image preload", err);
        }
    }
}

fn load(shared: &Rc<RefCell<Shared>>, ticket: ImageTicket) -> Result<(), JsValue> {
    let image = HtmlImageElement::new()?;
    let url = ticket.url.clone();

    let on_load = {
        let shared = shared.clone();
        let ticket = ticket.clone();
        Closure::once_into_js(move || finish(&shared, &ticket, true))
    };
    let on_error = {
        let shared = shared.clone();
        Closure::once_into_js(move || finish(&shared, &ticket, false))
    };

    image.set_onload(Some(on_load.unchecked_ref()));
    image.set_onerror(Some(on_error.unchecked_ref()));
    image.set_src(&url);
    Ok(())
}

fn finish(shared: &Rc<RefCell<Shared>>, ticket: &ImageTicket, loaded: bool) {
    let completion = shared
        .borrow_mut()
        .configurator
        .complete_image(ticket, loaded);

    match completion {
        ImageCompletion::Stale => return,
        ImageCompletion::Suppressed => {
            warn!(format!("Failed to load image: {}", ticket.url));
        }
        ImageCompletion::Reverted { .. } => {
            warn!(format!("Failed to load {}; keeping the previous stance", ticket.url));
            start(shared);
        }
        ImageCompletion::Shown => {}
    }
    notify(shared);
}
