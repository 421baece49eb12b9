use serde::Serialize;
use wc_api_types::SelectionState;

use crate::images::{ImageSlot, ImageSlots, ImageStatus};
use crate::matching::eq_ignore_case;
use crate::pagination::{self, GridLayout};
use crate::resolver::Resolver;

/// Everything a rendering layer needs, derived from state without mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub title: String,
    pub years: Vec<String>,
    pub makes: Vec<String>,
    pub models: Vec<String>,
    pub paint_colors: Vec<ColorOption>,
    pub brands: Vec<String>,
    pub vehicle_image: ImageView,
    pub overlay_image: ImageView,
    pub can_lower: bool,
    pub is_lowered: bool,
    pub wheel_models: Vec<ModelOption>,
    pub placeholders: usize,
    pub layout: GridLayout,
    pub finishes: Vec<FinishOption>,
    pub wheel: WheelSummary,
    pub pagination: PageInfo,
    /// No wheel fits the selected vehicle.
    pub no_compatible_wheels: bool,
    pub is_loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorOption {
    pub name: String,
    pub swatch: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub url: String,
    pub status: ImageStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOption {
    pub model: String,
    pub wheel_image: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishOption {
    pub finish: String,
    pub swatch: String,
    pub wheel_image: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelSummary {
    /// Selected brand as presented; the pinned name when pinned.
    pub brand: String,
    pub model: String,
    pub finish: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: usize,
    pub total_pages: usize,
    pub show_controls: bool,
    pub has_previous: bool,
    pub has_next: bool,
}

fn image_view(slots: &ImageSlots, slot: ImageSlot) -> ImageView {
    let state = slots.slot(slot);
    ImageView {
        url: state.displayed().to_string(),
        status: state.status(),
    }
}

pub fn derive_view(resolver: &Resolver<'_>, state: &SelectionState, images: &ImageSlots) -> ViewModel {
    let catalog = resolver.catalog();
    let vehicle = &state.vehicle;

    let paint_colors = resolver
        .paint_colors(state)
        .into_iter()
        .map(|color| ColorOption {
            selected: eq_ignore_case(&color.name, &vehicle.color),
            name: color.name,
            swatch: color.swatch,
        })
        .collect();

    let options = resolver.model_options(state);
    let page = pagination::paginate(
        &options,
        state.pagination.current_page,
        state.pagination.items_per_page,
    );

    let wheel_models = page
        .items
        .iter()
        .map(|wheel| ModelOption {
            model: wheel.model.clone(),
            wheel_image: wheel.wheel_image.clone(),
            selected: wheel.model == state.wheel.model,
        })
        .collect();

    let finishes = resolver
        .finish_options(state)
        .into_iter()
        .map(|wheel| FinishOption {
            finish: wheel.finish.clone(),
            swatch: wheel.swatch.clone(),
            wheel_image: wheel.wheel_image.clone(),
            selected: wheel.finish == state.wheel.finish,
        })
        .collect();

    let wheel = WheelSummary {
        brand: state.wheel.brand.clone(),
        model: state.wheel.model.clone(),
        finish: state.wheel.finish.clone(),
        id: resolver
            .selected_wheel(state)
            .map(|w| w.id.clone())
            .unwrap_or_default(),
    };

    ViewModel {
        title: format!("{} {} {}", vehicle.year, vehicle.make, vehicle.model)
            .trim()
            .to_string(),
        years: catalog.years(),
        makes: catalog.makes(&vehicle.year),
        models: catalog.models(&vehicle.year, &vehicle.make),
        paint_colors,
        brands: resolver.brand_options(state),
        vehicle_image: image_view(images, ImageSlot::Vehicle),
        overlay_image: image_view(images, ImageSlot::Overlay),
        can_lower: resolver.can_lower(state),
        is_lowered: vehicle.is_lowered,
        wheel_models,
        placeholders: page.placeholders(),
        layout: page.layout(),
        finishes,
        wheel,
        pagination: PageInfo {
            current_page: page.page,
            total_pages: page.total_pages,
            show_controls: page.show_controls(),
            has_previous: page.has_previous(),
            has_next: page.has_next(),
        },
        no_compatible_wheels: options.is_empty(),
        is_loading: state.is_loading,
    }
}
