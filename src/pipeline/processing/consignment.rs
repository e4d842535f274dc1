//! Lookup identifier extraction.
//!
//! Reports carry the carrier's shipment identifier in one of several columns,
//! and a single cell may list several identifiers separated by commas or spaces.

use crate::constants::{FIELD_BOOKING, FIELD_CONSIGNMENT};
use crate::pipeline::processing::carriers::CarrierCatalog;
use crate::types::ShipmentRow;

/// Identifier tokens of a raw cell, in order, with separators and empties dropped
pub fn segments(raw: &str) -> Vec<&str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect()
}

/// First identifier of a compound cell.
///
/// A cell holding a single token is returned exactly as written, surrounding
/// whitespace included; downstream consumers rely on that.
pub fn clean_identifier(raw: &str) -> String {
    let tokens = segments(raw);
    if tokens.len() > 1 {
        tokens[0].trim().to_string()
    } else {
        raw.to_string()
    }
}

/// Field of `row` holding the lookup identifier for `carrier`.
///
/// A carrier override wins when the row fills that field; otherwise `booking`
/// is preferred over `consignment`. `None` when the row has none of them.
pub fn select_key_field<'a>(
    row: &ShipmentRow,
    catalog: &'a CarrierCatalog,
    carrier: &str,
) -> Option<&'a str> {
    if let Some(field) = catalog.key_field_override(carrier) {
        if row.text(field).is_some() {
            return Some(field);
        }
    }
    [FIELD_BOOKING, FIELD_CONSIGNMENT]
        .into_iter()
        .find(|field| row.text(field).is_some())
}

/// Identifier a row is looked up (and deduplicated) by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    pub field: String,
    /// Cell content as written in the report
    pub raw: String,
    /// Output of [`clean_identifier`]
    pub value: String,
    /// Every identifier in the cell, used for multi-segment carriers
    pub segments: Vec<String>,
    pub multi_segment: bool,
}

impl LookupKey {
    pub fn extract(row: &ShipmentRow, catalog: &CarrierCatalog, carrier: &str) -> Option<Self> {
        let field = select_key_field(row, catalog, carrier)?;
        let raw = row.text(field)?;
        let value = clean_identifier(&raw);
        let segments: Vec<String> = segments(&raw).into_iter().map(str::to_string).collect();
        Some(Self {
            field: field.to_string(),
            multi_segment: catalog.is_multi_segment(carrier) && segments.len() > 1,
            raw,
            value,
            segments,
        })
    }

    /// Key of the per-batch resolution cache: the cleaned identifier.
    ///
    /// Multi-segment cells share it too; the other segments only feed the
    /// requests of the first row seen for the key.
    pub fn cache_key(&self) -> &str {
        &self.value
    }
}
