//! Header-keyed tables and their decoding into catalog records.
//!
//! Both catalog inputs (a CSV export and a spreadsheet values read) are
//! normalised into a [`Table`] first, so vehicle and wheel decoding exists once.

use tracing::{debug, warn};
use wc_api_types::{Vehicle, Wheel};

/// Header aliases tried, in order, for the lowered-stance image column.
pub const LOWER_IMAGE_HEADERS: &[&str] = &["Lower Image", "LowerImage", "Lower_Image", "Lower"];

/// Wheel columns that are attributes; every other column names a vehicle model.
pub const RESERVED_WHEEL_HEADERS: &[&str] = &["Brand", "Model", "Finish", "Wheel Image", "Swatch", "ID"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parses comma-separated text. Rows whose field count differs from the
    /// header are skipped.
    pub fn from_csv(text: &str) -> Self {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let Some(header_line) = lines.next() else {
            return Self::default();
        };

        let headers = split_csv_row(header_line);
        let mut rows = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let values = split_csv_row(line);
            if values.len() != headers.len() {
                warn!(
                    "row {} has {} values, expected {}; skipping",
                    line_no + 1,
                    values.len(),
                    headers.len()
                );
                continue;
            }
            rows.push(values);
        }

        Self { headers, rows }
    }

    /// Builds a table from a 2-D cell array whose first row is the header.
    /// Short rows are padded with empty cells; empty rows are dropped.
    pub fn from_values(values: &[Vec<String>]) -> Self {
        let Some((headers, body)) = values.split_first() else {
            return Self::default();
        };

        let rows = body
            .iter()
            .filter(|row| !row.is_empty())
            .map(|row| {
                let mut padded = row.clone();
                padded.resize(headers.len().max(row.len()), String::new());
                padded
            })
            .collect();

        Self {
            headers: headers.clone(),
            rows,
        }
    }

    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    fn cell<'a>(&self, row: &'a [String], column: Option<usize>) -> &'a str {
        column
            .and_then(|index| row.get(index))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Splits one CSV line, honouring double-quoted fields and `""` escapes.
/// Field values are trimmed.
pub fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_owned());
                current.clear();
            }
            other => current.push(other),
        }
    }
    fields.push(current.trim().to_owned());
    fields
}

pub fn decode_vehicles(table: &Table) -> Vec<Vehicle> {
    let year = table.column("Year");
    let make = table.column("Make");
    let model = table.column("Model");
    let color = table.column("Color");
    let image = table.column("Image");
    let swatch = table.column("Swatch");
    let lower = LOWER_IMAGE_HEADERS
        .iter()
        .find_map(|header| table.column(header));

    if lower.is_none() {
        debug!("no lowered image column among {:?}", table.headers);
    }

    let vehicles: Vec<Vehicle> = table
        .rows
        .iter()
        .map(|row| Vehicle {
            year: table.cell(row, year).to_owned(),
            make: table.cell(row, make).to_owned(),
            model: table.cell(row, model).to_owned(),
            color: table.cell(row, color).to_owned(),
            image: table.cell(row, image).to_owned(),
            swatch: table.cell(row, swatch).to_owned(),
            lower_image: table.cell(row, lower).to_owned(),
        })
        .collect();

    debug!(
        "decoded {} vehicles, {} with lowered images",
        vehicles.len(),
        vehicles.iter().filter(|v| v.has_lower_image()).count()
    );
    vehicles
}

pub fn decode_wheels(table: &Table) -> Vec<Wheel> {
    let brand = table.column("Brand");
    let model = table.column("Model");
    let finish = table.column("Finish");
    let wheel_image = table.column("Wheel Image");
    let swatch = table.column("Swatch");
    let id = table.column("ID");

    let fitment_columns: Vec<(usize, &str)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !RESERVED_WHEEL_HEADERS.contains(&header.as_str()))
        .map(|(index, header)| (index, header.as_str()))
        .collect();

    table
        .rows
        .iter()
        .map(|row| {
            let mut wheel = Wheel {
                brand: table.cell(row, brand).to_owned(),
                model: table.cell(row, model).to_owned(),
                finish: table.cell(row, finish).to_owned(),
                wheel_image: table.cell(row, wheel_image).to_owned(),
                swatch: table.cell(row, swatch).to_owned(),
                id: table.cell(row, id).to_owned(),
                ..Wheel::default()
            };

            for &(index, vehicle_model) in &fitment_columns {
                let overlay = table.cell(row, Some(index));
                if overlay.is_empty() {
                    continue;
                }
                wheel.compatible_vehicles.push(vehicle_model.to_owned());
                wheel
                    .vehicle_wheel_images
                    .insert(vehicle_model.to_owned(), overlay.to_owned());
            }
            wheel
        })
        .collect()
}
