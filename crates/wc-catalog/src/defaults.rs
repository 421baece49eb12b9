use std::collections::BTreeMap;
use wc_api_types::{Vehicle, Wheel};

const DEFAULT_VEHICLES: &[(&str, &str, &str, &str, &str)] = &[
    ("2024", "Subaru", "WRX VB", "Crystal Black Silica", "#171515"),
    ("2024", "Subaru", "WRX VB", "Ignition Red", "#d4161c"),
    ("2024", "Subaru", "WRX VB", "World Rally Blue", "#004aad"),
    ("2024", "Subaru", "WRX VB", "Ceramic White", "#f1f1f1"),
    ("2024", "Subaru", "WRX VB", "Magnetite Gray Metallic", "#545454"),
    ("2024", "Subaru", "BRZ 22", "World Rally Blue", "#004aad"),
];

const DEFAULT_WHEELS: &[(&str, &str)] = &[
    ("TR10", "Speedline White"),
    ("TR10", "Techna Bronze"),
    ("TR10", "Machine Black"),
    ("TP5", "Techna Bronze"),
    ("TS5", "Satin Titanium"),
    ("TD6LE", "Machine Black"),
];

const DEFAULT_WHEEL_BRAND: &str = "Titan 7";
const DEFAULT_FITMENT: &[&str] = &["WRX VB", "BRZ 22"];

pub(crate) fn vehicles() -> Vec<Vehicle> {
    DEFAULT_VEHICLES
        .iter()
        .map(|&(year, make, model, color, swatch)| Vehicle {
            year: year.to_owned(),
            make: make.to_owned(),
            model: model.to_owned(),
            color: color.to_owned(),
            image: String::new(),
            swatch: swatch.to_owned(),
            lower_image: String::new(),
        })
        .collect()
}

pub(crate) fn wheels() -> Vec<Wheel> {
    DEFAULT_WHEELS
        .iter()
        .map(|&(model, finish)| Wheel {
            brand: DEFAULT_WHEEL_BRAND.to_owned(),
            model: model.to_owned(),
            finish: finish.to_owned(),
            compatible_vehicles: DEFAULT_FITMENT.iter().map(|v| (*v).to_owned()).collect(),
            vehicle_wheel_images: DEFAULT_FITMENT
                .iter()
                .map(|v| ((*v).to_owned(), String::new()))
                .collect::<BTreeMap<_, _>>(),
            ..Wheel::default()
        })
        .collect()
}
