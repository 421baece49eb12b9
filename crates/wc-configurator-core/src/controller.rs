use tracing::{debug, info, warn};
use wc_api_types::{SelectionState, VehicleSelection, WheelSelection};
use wc_catalog::{Catalog, CompatibilityIndex};

use crate::images::{ImageCompletion, ImageOrigin, ImageSlot, ImageSlots, ImageTicket};
use crate::matching::eq_ignore_case;
use crate::pagination;
use crate::resolver::Resolver;
use crate::view::{ViewModel, derive_view};
use crate::{ConfiguratorConfig, ConfiguratorError};

/// Owns the catalog, its index and the single selection.
///
/// Every mutating operation bumps the selection generation and then
/// reconciles the selection against the catalog: colour, stance, page, wheel
/// model and finish are corrected and both preview images are re-aimed.
pub struct Configurator {
    config: ConfiguratorConfig,
    catalog: Catalog,
    index: CompatibilityIndex,
    state: SelectionState,
    generation: u64,
    images: ImageSlots,
}

impl Configurator {
    pub fn new(catalog: Catalog, config: ConfiguratorConfig) -> Self {
        let index = catalog.build_index();
        let mut configurator = Self {
            config,
            catalog,
            index,
            state: SelectionState::default(),
            generation: 0,
            images: ImageSlots::default(),
        };
        configurator.reset_to_defaults();
        configurator.reconcile(ImageOrigin::Selection);
        configurator
    }

    pub fn config(&self) -> &ConfiguratorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &CompatibilityIndex {
        &self.index
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn images(&self) -> &ImageSlots {
        &self.images
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.catalog, &self.index, &self.config)
    }

    pub fn view(&self) -> ViewModel {
        derive_view(&self.resolver(), &self.state, &self.images)
    }

    /// Selection as written to `lastConfig`.
    pub fn snapshot(&self) -> SelectionState {
        SelectionState {
            is_loading: false,
            ..self.state.clone()
        }
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
    }

    /// Installs a freshly loaded catalog and rebuilds the index. A selection
    /// whose vehicle vanished falls back to the first catalog vehicle.
    pub fn replace_catalog(&mut self, catalog: Catalog) {
        self.index = catalog.build_index();
        self.catalog = catalog;

        let vehicle = &self.state.vehicle;
        if self
            .catalog
            .any_color(&vehicle.year, &vehicle.make, &vehicle.model)
            .is_none()
        {
            info!(
                "{} {} {} is no longer in the catalog; resetting selection",
                vehicle.year, vehicle.make, vehicle.model
            );
            self.reset_to_defaults();
        }
        self.commit(ImageOrigin::Selection);
    }

    /// Restores a persisted selection when its vehicle still exists; otherwise
    /// resets to catalog defaults. Returns whether `saved` was accepted.
    pub fn restore(&mut self, saved: Option<SelectionState>) -> bool {
        let accepted = match saved {
            Some(saved)
                if self
                    .catalog
                    .any_color(&saved.vehicle.year, &saved.vehicle.make, &saved.vehicle.model)
                    .is_some() =>
            {
                debug!("restoring {:?}", saved.vehicle);
                self.state.vehicle = VehicleSelection {
                    is_lowered: false,
                    ..saved.vehicle
                };
                self.state.wheel = WheelSelection {
                    brand: self.config.pinned_brand.clone().unwrap_or(saved.wheel.brand),
                    model: saved.wheel.model,
                    finish: saved.wheel.finish,
                };
                self.state.pagination.current_page = 1;
                self.jump_to_selected_model();
                true
            }
            Some(_) => {
                warn!("saved configuration does not match the catalog; using defaults");
                self.reset_to_defaults();
                false
            }
            None => {
                self.reset_to_defaults();
                false
            }
        };
        self.commit(ImageOrigin::Selection);
        accepted
    }

    /// Switches to another vehicle. Keeps the current colour when that exact
    /// record exists, else borrows the colour of the first matching record.
    pub fn apply_vehicle(&mut self, year: &str, make: &str, model: &str) -> Result<(), ConfiguratorError> {
        let color = if self
            .catalog
            .vehicle(year, make, model, &self.state.vehicle.color)
            .is_some()
        {
            self.state.vehicle.color.clone()
        } else {
            self.catalog
                .any_color(year, make, model)
                .map(|record| record.color.clone())
                .ok_or_else(|| ConfiguratorError::VehicleNotFound {
                    year: year.to_string(),
                    make: make.to_string(),
                    model: model.to_string(),
                })?
        };

        self.state.vehicle = VehicleSelection {
            year: year.to_string(),
            make: make.to_string(),
            model: model.to_string(),
            color,
            is_lowered: false,
        };
        self.state.wheel.model.clear();
        self.state.wheel.finish.clear();
        if let Some(pinned) = &self.config.pinned_brand {
            self.state.wheel.brand = pinned.clone();
        }
        self.state.pagination.current_page = 1;

        info!("applied vehicle {year} {make} {model}");
        self.commit(ImageOrigin::Selection);
        Ok(())
    }

    pub fn select_color(&mut self, color: &str) -> Result<(), ConfiguratorError> {
        let name = self
            .resolver()
            .paint_colors(&self.state)
            .into_iter()
            .find(|paint| eq_ignore_case(&paint.name, color))
            .map(|paint| paint.name)
            .ok_or_else(|| ConfiguratorError::UnknownColor(color.to_string()))?;

        self.state.vehicle.color = name;
        self.commit(ImageOrigin::Selection);
        Ok(())
    }

    /// Only the pinned brand or a brand with wheels for this vehicle is accepted.
    pub fn select_brand(&mut self, brand: &str) -> Result<(), ConfiguratorError> {
        let pinned = self.config.pinned_brand.as_deref() == Some(brand);
        let offered = self
            .index
            .brands_for(&self.state.vehicle.model)
            .is_some_and(|brands| brands.contains(brand));
        if !pinned && !offered {
            return Err(ConfiguratorError::UnknownBrand(brand.to_string()));
        }

        self.state.wheel = WheelSelection {
            brand: brand.to_string(),
            ..WheelSelection::default()
        };
        self.state.pagination.current_page = 1;
        self.commit(ImageOrigin::Selection);
        Ok(())
    }

    pub fn select_model(&mut self, model: &str) -> Result<(), ConfiguratorError> {
        let resolver = self.resolver();
        let position = resolver
            .model_options(&self.state)
            .iter()
            .position(|wheel| wheel.model == model)
            .ok_or_else(|| ConfiguratorError::UnknownWheelModel(model.to_string()))?;
        let finish = resolver
            .first_finish(&self.state, model)
            .map(|wheel| wheel.finish.clone())
            .unwrap_or_default();

        self.state.pagination.current_page = pagination::page_of(position, self.config.page_size);
        self.state.wheel.model = model.to_string();
        self.state.wheel.finish = finish;
        self.commit(ImageOrigin::Selection);
        Ok(())
    }

    /// Picks a finish offered for the selected model. Under the pinned brand
    /// reconcile puts the model's first finish straight back.
    pub fn select_finish(&mut self, finish: &str) -> Result<(), ConfiguratorError> {
        let offered = self
            .resolver()
            .finish_options(&self.state)
            .iter()
            .any(|wheel| wheel.finish == finish);
        if !offered {
            return Err(ConfiguratorError::UnknownFinish(finish.to_string()));
        }

        self.state.wheel.finish = finish.to_string();
        self.commit(ImageOrigin::Selection);
        Ok(())
    }

    /// Flips between the stock and lowered photo. A no-op, returning false,
    /// when the matched vehicle has no lowered art.
    pub fn toggle_lowered(&mut self) -> bool {
        let resolver = self.resolver();
        let previous = self.state.vehicle.is_lowered;
        if !resolver.can_lower(&self.state) {
            debug!("no lowered image for the selected vehicle");
            return false;
        }
        if resolver.vehicle_image_for(&self.state, !previous).is_none() {
            debug!("no image for the requested stance");
            return false;
        }

        self.state.vehicle.is_lowered = !previous;
        self.commit(ImageOrigin::LoweredToggle { previous });
        true
    }

    pub fn set_lowered(&mut self, lowered: bool) -> bool {
        self.state.vehicle.is_lowered != lowered && self.toggle_lowered()
    }

    /// Jumps to `page`, clamped to the valid range. Returns false when the
    /// page does not change.
    pub fn set_page(&mut self, page: usize) -> bool {
        let page = page.clamp(1, self.state.pagination.total_pages.max(1));
        if page == self.state.pagination.current_page {
            return false;
        }
        self.state.pagination.current_page = page;
        self.commit(ImageOrigin::Selection);
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.state.pagination.current_page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        self.set_page(self.state.pagination.current_page.saturating_sub(1))
    }

    /// Preloads the host has yet to start.
    pub fn take_image_requests(&mut self) -> Vec<ImageTicket> {
        self.images.take_requests()
    }

    /// Reports a preload result. Completions of superseded tickets are ignored.
    pub fn complete_image(&mut self, ticket: &ImageTicket, loaded: bool) -> ImageCompletion {
        let completion = self.images.complete(ticket, loaded);
        match completion {
            ImageCompletion::Suppressed => {
                warn!("failed to load {:?} image {}", ticket.slot, ticket.url);
            }
            ImageCompletion::Reverted { previous } => {
                warn!("failed to load {}; restoring previous stance", ticket.url);
                self.state.vehicle.is_lowered = previous;
                self.commit(ImageOrigin::Selection);
            }
            ImageCompletion::Shown | ImageCompletion::Stale => {}
        }
        completion
    }

    fn reset_to_defaults(&mut self) {
        self.state.vehicle = self
            .catalog
            .vehicles
            .first()
            .map(|record| VehicleSelection {
                year: record.year.clone(),
                make: record.make.clone(),
                model: record.model.clone(),
                color: record.color.clone(),
                is_lowered: false,
            })
            .unwrap_or_default();
        self.state.wheel = WheelSelection {
            brand: self.config.pinned_brand.clone().unwrap_or_default(),
            ..WheelSelection::default()
        };
        self.state.pagination.current_page = 1;
    }

    fn jump_to_selected_model(&mut self) {
        let position = self
            .resolver()
            .model_options(&self.state)
            .iter()
            .position(|wheel| wheel.model == self.state.wheel.model);
        if let Some(position) = position {
            self.state.pagination.current_page = pagination::page_of(position, self.config.page_size);
        }
    }

    fn commit(&mut self, vehicle_origin: ImageOrigin) {
        self.generation += 1;
        self.reconcile(vehicle_origin);
    }

    fn reconcile(&mut self, vehicle_origin: ImageOrigin) {
        let resolver = Resolver::new(&self.catalog, &self.index, &self.config);
        let state = &mut self.state;

        let colors = resolver.paint_colors(state);
        if !colors.iter().any(|c| eq_ignore_case(&c.name, &state.vehicle.color)) {
            if let Some(first) = colors.first() {
                state.vehicle.color = first.name.clone();
            }
        }

        if state.vehicle.is_lowered && !resolver.can_lower(state) {
            state.vehicle.is_lowered = false;
        }

        if !resolver.is_pinned(&state.wheel) {
            let brands = self.index.brands_for(&state.vehicle.model);
            if !brands.is_some_and(|brands| brands.contains(&state.wheel.brand)) {
                let fallback = self
                    .config
                    .pinned_brand
                    .clone()
                    .or_else(|| brands.and_then(|brands| brands.first().cloned()));
                if let Some(brand) = fallback {
                    state.wheel.brand = brand;
                }
            }
        }

        let options = resolver.model_options(state);
        state.pagination.items_per_page = self.config.page_size.max(1);
        let page = pagination::paginate(
            &options,
            state.pagination.current_page,
            state.pagination.items_per_page,
        );
        state.pagination.current_page = page.page;
        state.pagination.total_pages = page.total_pages;

        let on_page = page.items.iter().any(|wheel| wheel.model == state.wheel.model);
        if !on_page {
            match page.items.first() {
                Some(first) => {
                    state.wheel.model = first.model.clone();
                    state.wheel.finish = first.finish.clone();
                }
                None => {
                    if !state.wheel.model.is_empty() {
                        warn!("no wheels fit {}", state.vehicle.model);
                    }
                    state.wheel.model.clear();
                    state.wheel.finish.clear();
                }
            }
        }

        if !state.wheel.model.is_empty() {
            let finishes = resolver.finish_options(state);
            let offered = finishes.iter().any(|wheel| wheel.finish == state.wheel.finish);
            // the pinned brand always shows the model's first finish
            if !offered || resolver.is_pinned(&state.wheel) {
                state.wheel.finish = resolver
                    .first_finish(state, &state.wheel.model)
                    .or_else(|| finishes.first().copied())
                    .map(|wheel| wheel.finish.clone())
                    .unwrap_or_default();
            }
        }

        let vehicle_url = resolver.vehicle_image_url(state);
        let overlay_url = resolver.overlay_url(state);
        self.images
            .request(ImageSlot::Vehicle, vehicle_url, self.generation, vehicle_origin);
        self.images
            .request(ImageSlot::Overlay, overlay_url, self.generation, ImageOrigin::Selection);
    }
}
