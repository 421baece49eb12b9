//! Read-only answers about the current selection: candidate wheels, the model
//! grid, finishes, the concrete wheel record and both preview images.

use std::collections::HashSet;
use wc_api_types::{SelectionState, Vehicle, Wheel, WheelSelection};
use wc_catalog::{Catalog, CompatibilityIndex};

use crate::ConfiguratorConfig;
use crate::matching::{self, eq_ignore_case};

/// Shown for paint records that carry no swatch.
pub const FALLBACK_SWATCH: &str = "#e82c2c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaintColor {
    pub name: String,
    pub swatch: String,
}

#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    index: &'a CompatibilityIndex,
    config: &'a ConfiguratorConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, index: &'a CompatibilityIndex, config: &'a ConfiguratorConfig) -> Self {
        Self {
            catalog,
            index,
            config,
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// The pinned brand aggregates every catalog brand.
    pub fn is_pinned(&self, wheel: &WheelSelection) -> bool {
        self.config
            .pinned_brand
            .as_deref()
            .is_some_and(|pinned| pinned == wheel.brand)
    }

    /// The pinned brand, if any, followed by every brand with wheels for the vehicle.
    pub fn brand_options(&self, state: &SelectionState) -> Vec<String> {
        let fitting = self.index.brands_for(&state.vehicle.model).into_iter().flatten();
        self.config
            .pinned_brand
            .iter()
            .chain(fitting)
            .cloned()
            .collect()
    }

    /// Wheels fitting the selected vehicle, restricted to the selected brand
    /// unless that brand is pinned. Catalog order.
    pub fn candidates(&self, state: &SelectionState) -> Vec<&'a Wheel> {
        let fitting = self
            .index
            .wheels_for(&self.catalog.wheels, &state.vehicle.model);
        if self.is_pinned(&state.wheel) {
            fitting.collect()
        } else {
            fitting.filter(|wheel| wheel.brand == state.wheel.brand).collect()
        }
    }

    /// First candidate of every distinct model, in first-seen order.
    pub fn model_options(&self, state: &SelectionState) -> Vec<&'a Wheel> {
        let mut seen = HashSet::new();
        self.candidates(state)
            .into_iter()
            .filter(|&wheel| seen.insert(wheel.model.as_str()))
            .collect()
    }

    /// Every finish of the selected model that fits the vehicle.
    pub fn finish_options(&self, state: &SelectionState) -> Vec<&'a Wheel> {
        let vehicle_model = state.vehicle.model.as_str();
        let wheels = &self.catalog.wheels;
        if self.is_pinned(&state.wheel) {
            self.index
                .variants_of_model(wheels, &state.wheel.model)
                .filter(|wheel| wheel.fits(vehicle_model))
                .collect()
        } else {
            self.index
                .variants(wheels, &state.wheel.brand, &state.wheel.model)
                .filter(|wheel| wheel.fits(vehicle_model))
                .collect()
        }
    }

    /// Default finish for `model`: under the pinned brand the first wheel of
    /// that model in the vehicle's list, otherwise the first listed finish.
    pub fn first_finish(&self, state: &SelectionState, model: &str) -> Option<&'a Wheel> {
        if self.is_pinned(&state.wheel) {
            self.index
                .wheels_for(&self.catalog.wheels, &state.vehicle.model)
                .find(|wheel| wheel.model == model)
        } else {
            self.index
                .variants(&self.catalog.wheels, &state.wheel.brand, model)
                .find(|wheel| wheel.fits(&state.vehicle.model))
        }
    }

    /// The concrete wheel record behind (model, finish) for this vehicle.
    pub fn selected_wheel(&self, state: &SelectionState) -> Option<&'a Wheel> {
        if state.wheel.model.is_empty() {
            return None;
        }
        self.finish_options(state)
            .into_iter()
            .find(|wheel| wheel.finish == state.wheel.finish)
    }

    /// Overlay art of the selected wheel for the selected vehicle, if any.
    pub fn overlay_url(&self, state: &SelectionState) -> Option<&'a str> {
        self.selected_wheel(state)?
            .overlay_for(&state.vehicle.model)
    }

    pub fn matched_vehicle(&self, state: &SelectionState) -> Option<&'a Vehicle> {
        matching::find_vehicle(&self.catalog.vehicles, &state.vehicle)
    }

    /// Whether the matched vehicle offers a lowered photo.
    pub fn can_lower(&self, state: &SelectionState) -> bool {
        self.matched_vehicle(state)
            .is_some_and(Vehicle::has_lower_image)
    }

    /// Photo for the given stance, `None` when the record or its art is missing.
    pub fn vehicle_image_for(&self, state: &SelectionState, lowered: bool) -> Option<&'a str> {
        let vehicle = self.matched_vehicle(state)?;
        let url = if lowered && vehicle.has_lower_image() {
            vehicle.lower_image.as_str()
        } else {
            vehicle.image.as_str()
        };
        Some(url).filter(|url| !url.trim().is_empty())
    }

    pub fn vehicle_image_url(&self, state: &SelectionState) -> Option<&'a str> {
        self.vehicle_image_for(state, state.vehicle.is_lowered)
    }

    /// Paint colours of the selected model line, first occurrence of each name.
    pub fn paint_colors(&self, state: &SelectionState) -> Vec<PaintColor> {
        let mut colors: Vec<PaintColor> = Vec::new();
        for record in &self.catalog.vehicles {
            if !matching::same_model_line(record, &state.vehicle) {
                continue;
            }
            if colors.iter().any(|c| eq_ignore_case(&c.name, &record.color)) {
                continue;
            }
            let swatch = if record.swatch.trim().is_empty() {
                FALLBACK_SWATCH.to_string()
            } else {
                record.swatch.clone()
            };
            colors.push(PaintColor {
                name: record.color.clone(),
                swatch,
            });
        }
        colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_PINNED_BRAND;
    use wc_api_types::VehicleSelection;

    fn wheel(brand: &str, model: &str, finish: &str, fits: &[(&str, &str)]) -> Wheel {
        Wheel {
            brand: brand.into(),
            model: model.into(),
            finish: finish.into(),
            swatch: format!("{finish}.png"),
            compatible_vehicles: fits.iter().map(|(v, _)| (*v).to_owned()).collect(),
            vehicle_wheel_images: fits
                .iter()
                .map(|(v, url)| ((*v).to_owned(), (*url).to_owned()))
                .collect(),
            ..Wheel::default()
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Vehicle {
                    year: "2024".into(),
                    make: "Subaru".into(),
                    model: "WRX VB".into(),
                    color: "Ignition Red".into(),
                    image: "a.png".into(),
                    swatch: "#d4161c".into(),
                    lower_image: String::new(),
                },
                Vehicle {
                    year: "2024".into(),
                    make: "Subaru".into(),
                    model: "WRX VB".into(),
                    color: "Ceramic White".into(),
                    image: "w.png".into(),
                    swatch: String::new(),
                    lower_image: "w-low.png".into(),
                },
            ],
            vec![
                wheel("A", "TR10", "Black", &[("WRX VB", "tr10-black.png")]),
                wheel("B", "TP5", "Bronze", &[("WRX VB", "")]),
                wheel("B", "TR10", "Gold", &[("WRX VB", "tr10-gold.png")]),
                wheel("A", "TR10", "White", &[("BRZ 22", "tr10-white.png")]),
            ],
        )
    }

    fn state(brand: &str, model: &str, finish: &str) -> SelectionState {
        SelectionState {
            vehicle: VehicleSelection {
                year: "2024".into(),
                make: "Subaru".into(),
                model: "WRX VB".into(),
                color: "Ignition Red".into(),
                is_lowered: false,
            },
            wheel: WheelSelection {
                brand: brand.into(),
                model: model.into(),
                finish: finish.into(),
            },
            ..SelectionState::default()
        }
    }

    fn models(wheels: &[&Wheel]) -> Vec<String> {
        wheels.iter().map(|w| w.model.clone()).collect()
    }

    #[test]
    fn pinned_brand_aggregates_and_dedupes_by_model() {
        let catalog = catalog();
        let index = catalog.build_index();
        let config = ConfiguratorConfig::default();
        let resolver = Resolver::new(&catalog, &index, &config);

        let options = resolver.model_options(&state(DEFAULT_PINNED_BRAND, "", ""));
        assert_eq!(models(&options), vec!["TR10", "TP5"]);
        assert_eq!(options[0].brand, "A");
    }

    #[test]
    fn brand_options_lead_with_pinned_brand() {
        let catalog = catalog();
        let index = catalog.build_index();
        let config = ConfiguratorConfig::default();
        let resolver = Resolver::new(&catalog, &index, &config);

        let brands = resolver.brand_options(&state(DEFAULT_PINNED_BRAND, "", ""));
        assert_eq!(brands, vec![DEFAULT_PINNED_BRAND, "A", "B"]);
    }

    #[test]
    fn real_brand_filters_candidates() {
        let catalog = catalog();
        let index = catalog.build_index();
        let config = ConfiguratorConfig::default();
        let resolver = Resolver::new(&catalog, &index, &config);

        let options = resolver.model_options(&state("B", "", ""));
        assert_eq!(models(&options), vec!["TP5", "TR10"]);

        let finishes = resolver.finish_options(&state("B", "TR10", ""));
        assert_eq!(finishes.len(), 1);
        assert_eq!(finishes[0].finish, "Gold");
    }

    #[test]
    fn pinned_finishes_span_brands_and_respect_fitment() {
        let catalog = catalog();
        let index = catalog.build_index();
        let config = ConfiguratorConfig::default();
        let resolver = Resolver::new(&catalog, &index, &config);

        let finishes: Vec<&str> = resolver
            .finish_options(&state(DEFAULT_PINNED_BRAND, "TR10", ""))
            .into_iter()
            .map(|w| w.finish.as_str())
            .collect();
        assert_eq!(finishes, vec!["Black", "Gold"]);
    }

    #[test]
    fn overlay_is_looked_up_by_vehicle_model() {
        let catalog = catalog();
        let index = catalog.build_index();
        let config = ConfiguratorConfig::default();
        let resolver = Resolver::new(&catalog, &index, &config);

        let gold = state(DEFAULT_PINNED_BRAND, "TR10", "Gold");
        assert_eq!(resolver.overlay_url(&gold), Some("tr10-gold.png"));

        // empty art suppresses the overlay without failing
        let bronze = state(DEFAULT_PINNED_BRAND, "TP5", "Bronze");
        assert!(resolver.selected_wheel(&bronze).is_some());
        assert_eq!(resolver.overlay_url(&bronze), None);

        let unknown = state(DEFAULT_PINNED_BRAND, "TR10", "Chrome");
        assert_eq!(resolver.overlay_url(&unknown), None);
    }

    #[test]
    fn lowered_photo_requires_art() {
        let catalog = catalog();
        let index = catalog.build_index();
        let config = ConfiguratorConfig::default();
        let resolver = Resolver::new(&catalog, &index, &config);

        let red = state(DEFAULT_PINNED_BRAND, "", "");
        assert!(!resolver.can_lower(&red));
        assert_eq!(resolver.vehicle_image_for(&red, true), Some("a.png"));

        let mut white = red.clone();
        white.vehicle.color = "ceramic white".into();
        assert!(resolver.can_lower(&white));
        assert_eq!(resolver.vehicle_image_for(&white, true), Some("w-low.png"));
        assert_eq!(resolver.vehicle_image_for(&white, false), Some("w.png"));
    }

    #[test]
    fn paint_colours_fall_back_to_default_swatch() {
        let catalog = catalog();
        let index = catalog.build_index();
        let config = ConfiguratorConfig::default();
        let resolver = Resolver::new(&catalog, &index, &config);

        let colors = resolver.paint_colors(&state(DEFAULT_PINNED_BRAND, "", ""));
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].swatch, "#d4161c");
        assert_eq!(colors[1].swatch, FALLBACK_SWATCH);
    }
}
