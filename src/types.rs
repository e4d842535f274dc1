use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One cargo movement from a shipment report, keyed by canonical field name.
///
/// Null and absent fields are treated the same way by every accessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentRow(Map<String, Value>);

impl ShipmentRow {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Non-null value of a field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn is_set(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Text of a field as it appears in the report, untrimmed.
    ///
    /// Numbers are rendered as text since spreadsheet exports routinely type
    /// identifiers as numbers. Blank strings count as missing.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Explicit boolean flag. Unparseable values read as `None`.
    pub fn flag(&self, field: &str) -> Option<bool> {
        match self.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|n| n != 0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "да" => Some(true),
                "false" | "0" | "no" | "нет" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }

    /// Insert `null` for a field the row does not carry yet
    pub fn ensure_field(&mut self, field: &str) {
        self.0.entry(field.to_string()).or_insert(Value::Null);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.0.iter_mut()
    }

    pub fn is_blank(&self) -> bool {
        self.0.values().all(Value::is_null)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ShipmentRow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ShipmentRow {
    type Error = Value;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Direction of a cargo movement as sent to the tracking service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    Import,
    Export,
    Cabotage,
    /// Anything the report uses that we have no canonical name for
    Other(String),
}

impl Direction {
    /// Reads the `direction` cell. A missing direction defaults to import.
    pub fn from_field(value: Option<&str>) -> Self {
        let Some(raw) = value.map(str::trim).filter(|s| !s.is_empty()) else {
            return Direction::Import;
        };
        match raw.to_lowercase().as_str() {
            "import" | "импорт" => Direction::Import,
            "export" | "экспорт" => Direction::Export,
            "cabotage" | "каботаж" => Direction::Cabotage,
            _ => Direction::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Direction::Import => "import",
            Direction::Export => "export",
            Direction::Cabotage => "cabotage",
            Direction::Other(s) => s,
        }
    }
}
