//! Vehicle record matching.
//!
//! Catalog sheets are maintained by hand and model names drift between the
//! vehicle and wheel tabs ("F8X" vs "F8X 3 Series"), so model comparison is a
//! case-insensitive containment test in either direction. Year is compared
//! exactly; make and colour ignore case.

use wc_api_types::{Vehicle, VehicleSelection};

pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// True when either model name contains the other, ignoring case.
pub fn models_match(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

/// Same year, make and (fuzzy) model; colour is not considered.
pub fn same_model_line(record: &Vehicle, selection: &VehicleSelection) -> bool {
    record.year == selection.year
        && eq_ignore_case(&record.make, &selection.make)
        && models_match(&record.model, &selection.model)
}

pub fn matches_selection(record: &Vehicle, selection: &VehicleSelection) -> bool {
    same_model_line(record, selection) && eq_ignore_case(&record.color, &selection.color)
}

/// First record matching the full selection.
pub fn find_vehicle<'a>(vehicles: &'a [Vehicle], selection: &VehicleSelection) -> Option<&'a Vehicle> {
    vehicles.iter().find(|record| matches_selection(record, selection))
}
