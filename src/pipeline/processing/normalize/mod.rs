//! Report normalization: localized spreadsheet columns to canonical shipment rows.

pub mod registry;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use crate::constants::{
    FIELD_DIRECTION, FIELD_ORIGINAL_FILE_NAME, FIELD_ORIGINAL_FILE_PARSED_ON, GTD_NUMBER_PLACEHOLDER,
    PARSED_ON_FORMAT,
};
use crate::types::ShipmentRow;
pub use registry::HeaderRegistry;

const INTEGER_FIELDS: &[&str] = &["year", "month", "teu", "container_size", "container_count"];
const FLOAT_FIELDS: &[&str] = &["goods_weight_with_package", "goods_weight_brutto"];
const DATE_FIELDS: &[&str] = &["shipment_date"];
const CODE_FIELDS: &[&str] = &["tnved_group_id"];
const FIELD_GTD_NUMBER: &str = "gtd_number";

const DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];
const DATETIME_INPUT_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d.%m.%Y %H:%M:%S"];

/// A report sheet as read from disk: header row plus untyped cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Provenance stamped onto every row of a report
#[derive(Debug, Clone)]
pub struct ReportOrigin {
    pub file_name: String,
    pub parsed_on: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct ReportNormalizer {
    headers: HeaderRegistry,
}

impl ReportNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename, clean and type the cells of a report. Rows with no values are dropped.
    pub fn normalize(&self, table: RawTable, origin: &ReportOrigin) -> Vec<ShipmentRow> {
        let plan = self.headers.plan_columns(&table.headers);
        let has_gtd_column = plan.iter().flatten().any(|f| f == FIELD_GTD_NUMBER);
        let parsed_on = origin.parsed_on.format(PARSED_ON_FORMAT).to_string();

        table
            .rows
            .into_iter()
            .filter_map(|cells| {
                let mut row = ShipmentRow::new();
                for (target, cell) in plan.iter().zip(cells) {
                    if let Some(field) = target {
                        row.set(field, clean_cell(cell));
                    }
                }
                if row.is_blank() {
                    return None;
                }

                for (field, value) in row.fields_mut() {
                    coerce(field, value);
                }
                if has_gtd_column && !row.is_set(FIELD_GTD_NUMBER) {
                    row.set(FIELD_GTD_NUMBER, Value::String(GTD_NUMBER_PLACEHOLDER.to_string()));
                }
                row.set(FIELD_ORIGINAL_FILE_NAME, Value::String(origin.file_name.clone()));
                row.set(FIELD_ORIGINAL_FILE_PARSED_ON, Value::String(parsed_on.clone()));
                Some(row)
            })
            .collect()
    }
}

/// Trim strings; blank strings become null
fn clean_cell(cell: Value) -> Value {
    match cell {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        Value::Number(n) if n.as_f64().map_or(false, f64::is_nan) => Value::Null,
        other => other,
    }
}

fn coerce(field: &str, value: &mut Value) {
    if value.is_null() {
        return;
    }
    let coerced = if field == FIELD_DIRECTION {
        translate_direction(value)
    } else if INTEGER_FIELDS.contains(&field) {
        to_integer(value)
    } else if FLOAT_FIELDS.contains(&field) {
        to_float(value)
    } else if DATE_FIELDS.contains(&field) {
        to_date(value)
    } else if CODE_FIELDS.contains(&field) {
        to_code(value)
    } else {
        None
    };
    if let Some(coerced) = coerced {
        *value = coerced;
    }
}

fn translate_direction(value: &Value) -> Option<Value> {
    let text = value.as_str()?;
    let canonical = match text.to_lowercase().as_str() {
        "импорт" => "import",
        "экспорт" => "export",
        "каботаж" => "cabotage",
        _ => return None,
    };
    Some(Value::String(canonical.to_string()))
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse::<i64>().ok().map(Value::from)
        }
        Value::Number(n) if n.is_f64() => {
            let f = n.as_f64()?;
            (f.fract() == 0.0).then(|| Value::from(f as i64))
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => s
            .replace(',', ".")
            .replace(' ', "")
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

fn to_date(value: &Value) -> Option<Value> {
    let text = value.as_str()?;
    let date = DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok().map(|dt| dt.date()))
        .or_else(|| {
            DATE_INPUT_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })?;
    Some(Value::String(date.format("%Y-%m-%d").to_string()))
}

/// Group codes come out of spreadsheets as floats ("12.0"); keep them as integer text
fn to_code(value: &Value) -> Option<Value> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    (number.fract() == 0.0).then(|| Value::String(format!("{}", number as i64)))
}
