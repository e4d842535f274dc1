use crate::app::ports::ReportSourcePort;
use crate::error::{EnrichError, Result};
use crate::pipeline::processing::normalize::RawTable;
use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Number, Value};
use std::path::Path;
use tracing::debug;

/// Reads CSV exports and spreadsheet workbooks (first sheet) into a [`RawTable`]
pub struct SpreadsheetReportSource;

#[async_trait]
impl ReportSourcePort for SpreadsheetReportSource {
    async fn read_report(&self, path: &Path) -> Result<RawTable> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let table = match extension.as_str() {
            "csv" => read_csv(path)?,
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path)?,
            other => {
                return Err(EnrichError::Input {
                    message: format!("Unsupported report format '{}' for {}", other, path.display()),
                })
            }
        };
        debug!(path = %path.display(), columns = table.headers.len(), rows = table.rows.len(), "report read");
        Ok(table)
    }
}

pub fn read_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| Value::String(field.to_string())).collect());
    }
    Ok(RawTable { headers, rows })
}

pub fn read_workbook(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| EnrichError::Input {
        message: format!("Failed to open workbook {}: {}", path.display(), e),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EnrichError::Input {
            message: format!("Workbook {} contains no sheets", path.display()),
        })?
        .map_err(|e| EnrichError::Input {
            message: format!("Failed to read first sheet of {}: {}", path.display(), e),
        })?;

    let mut sheet_rows = range.rows();
    let headers = match sheet_rows.next() {
        Some(cells) => cells.iter().map(header_text).collect(),
        None => return Ok(RawTable::default()),
    };
    let rows = sheet_rows
        .map(|cells| cells.iter().map(cell_value).collect())
        .collect();
    Ok(RawTable { headers, rows })
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Int(n) => Value::from(*n),
        Data::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Value::String(datetime.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Number::from_f64(dt.as_f64()).map_or(Value::Null, Value::Number),
        },
    }
}
