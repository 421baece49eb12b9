//! Derived lookups over the wheel collection.
//!
//! The index stores positions into the wheel slice it was built from, so it
//! must be rebuilt whenever that slice is replaced. Accessors take the slice
//! back and skip positions that no longer exist.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use wc_api_types::Wheel;

/// Composite key of the brand/model index.
pub fn brand_model_key(brand: &str, model: &str) -> String {
    format!("{brand}|{model}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatibilityIndex {
    wheels_by_vehicle: HashMap<String, Vec<usize>>,
    brands_by_vehicle: HashMap<String, BTreeSet<String>>,
    finishes_by_brand_model: HashMap<String, Vec<usize>>,
    // first-seen order of (brand, model) pairs
    brand_models: Vec<(String, String)>,
}

impl CompatibilityIndex {
    pub fn build(wheels: &[Wheel]) -> Self {
        let mut index = Self::default();

        for (position, wheel) in wheels.iter().enumerate() {
            for vehicle_model in &wheel.compatible_vehicles {
                index
                    .wheels_by_vehicle
                    .entry(vehicle_model.clone())
                    .or_default()
                    .push(position);
                index
                    .brands_by_vehicle
                    .entry(vehicle_model.clone())
                    .or_default()
                    .insert(wheel.brand.clone());
            }

            let key = brand_model_key(&wheel.brand, &wheel.model);
            let variants = index.finishes_by_brand_model.entry(key).or_default();
            if variants.is_empty() {
                index
                    .brand_models
                    .push((wheel.brand.clone(), wheel.model.clone()));
            }
            variants.push(position);
        }

        debug!(
            "indexed {} vehicles, {} wheel models",
            index.wheels_by_vehicle.len(),
            index.brand_models.len()
        );
        index
    }

    pub fn has_vehicle(&self, vehicle_model: &str) -> bool {
        self.wheels_by_vehicle.contains_key(vehicle_model)
    }

    pub fn vehicle_count(&self) -> usize {
        self.wheels_by_vehicle.len()
    }

    pub fn brand_model_count(&self) -> usize {
        self.brand_models.len()
    }

    /// Wheels listing `vehicle_model` as compatible, in catalog order.
    pub fn wheels_for<'a>(
        &self,
        wheels: &'a [Wheel],
        vehicle_model: &str,
    ) -> impl Iterator<Item = &'a Wheel> {
        self.wheels_by_vehicle
            .get(vehicle_model)
            .into_iter()
            .flatten()
            .filter_map(move |&position| wheels.get(position))
    }

    pub fn brands_for(&self, vehicle_model: &str) -> Option<&BTreeSet<String>> {
        self.brands_by_vehicle.get(vehicle_model)
    }

    /// Every finish of one brand's model, regardless of compatibility.
    pub fn variants<'a>(
        &self,
        wheels: &'a [Wheel],
        brand: &str,
        model: &str,
    ) -> impl Iterator<Item = &'a Wheel> {
        self.finishes_by_brand_model
            .get(&brand_model_key(brand, model))
            .into_iter()
            .flatten()
            .filter_map(move |&position| wheels.get(position))
    }

    /// Every finish of `model` across all brands, grouped by brand in first-seen order.
    pub fn variants_of_model<'a>(
        &self,
        wheels: &'a [Wheel],
        model: &str,
    ) -> impl Iterator<Item = &'a Wheel> {
        self.brand_models
            .iter()
            .filter(move |(_, candidate)| candidate == model)
            .filter_map(move |(brand, model)| {
                self.finishes_by_brand_model
                    .get(&brand_model_key(brand, model))
            })
            .flatten()
            .filter_map(move |&position| wheels.get(position))
    }
}
