//! Carrier catalog: the line unification table plus the per-carrier tracking rules.
//!
//! The catalog is loaded once per run from the reference store and is never
//! mutated afterwards. Every component receives it by reference.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Serialized form of the reference data, as stored in a catalog snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Canonical carrier name -> surface forms seen in reports
    #[serde(default)]
    pub lines: BTreeMap<String, Vec<String>>,
    /// Carriers the tracking service knows about. `None` tracks every unified line.
    #[serde(default)]
    pub tracked: Option<Vec<String>>,
    /// Carriers whose empty-container moves are not looked up
    #[serde(default)]
    pub suppress_if_empty: Vec<String>,
    /// Carriers whose consignments may list several sub-consignments
    #[serde(default)]
    pub multi_segment: Vec<String>,
    /// Carrier -> row field holding its lookup identifier
    #[serde(default)]
    pub key_fields: BTreeMap<String, String>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line(mut self, canonical: &str, surface_forms: &[&str]) -> Self {
        self.lines.insert(
            canonical.to_string(),
            surface_forms.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn track(mut self, canonical: &str) -> Self {
        self.tracked.get_or_insert_with(Vec::new).push(canonical.to_string());
        self
    }

    pub fn suppress_if_empty(mut self, canonical: &str) -> Self {
        self.suppress_if_empty.push(canonical.to_string());
        self
    }

    pub fn multi_segment(mut self, canonical: &str) -> Self {
        self.multi_segment.push(canonical.to_string());
        self
    }

    pub fn key_field(mut self, canonical: &str, field: &str) -> Self {
        self.key_fields.insert(canonical.to_string(), field.to_string());
        self
    }
}

/// Immutable lookup structure built from a [`CatalogSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct CarrierCatalog {
    // uppercased surface form -> canonical name as written in the reference data
    surface_index: HashMap<String, String>,
    // the sets below are keyed by the uppercased canonical name
    tracked: Option<HashSet<String>>,
    suppress_if_empty: HashSet<String>,
    multi_segment: HashSet<String>,
    key_fields: HashMap<String, String>,
}

fn fold(name: &str) -> String {
    name.trim().to_uppercase()
}

impl CarrierCatalog {
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let mut surface_index = HashMap::new();

        for (canonical, forms) in &snapshot.lines {
            surface_index.insert(fold(canonical), canonical.clone());
            for form in forms.iter().filter(|f| !f.trim().is_empty()) {
                surface_index
                    .entry(fold(form))
                    .or_insert_with(|| canonical.clone());
            }
        }

        // A tracked carrier with no unification entry still matches its own name
        for canonical in snapshot.tracked.iter().flatten() {
            surface_index
                .entry(fold(canonical))
                .or_insert_with(|| canonical.clone());
        }

        let to_set = |names: &[String]| names.iter().map(|n| fold(n)).collect::<HashSet<_>>();

        Self {
            surface_index,
            tracked: snapshot.tracked.as_deref().map(to_set),
            suppress_if_empty: to_set(&snapshot.suppress_if_empty),
            multi_segment: to_set(&snapshot.multi_segment),
            key_fields: snapshot
                .key_fields
                .iter()
                .filter(|(_, field)| !field.trim().is_empty())
                .map(|(carrier, field)| (fold(carrier), field.trim().to_string()))
                .collect(),
        }
    }

    /// Canonical name for a raw carrier string, if the unification table knows it
    pub fn canonical(&self, raw_line: &str) -> Option<&str> {
        self.surface_index.get(&fold(raw_line)).map(String::as_str)
    }

    /// Canonical name for the lookup request; unknown carriers are sent as written
    pub fn canonical_or_raw(&self, raw_line: &str) -> String {
        self.canonical(raw_line)
            .map(str::to_string)
            .unwrap_or_else(|| raw_line.trim().to_string())
    }

    /// Canonical name when the carrier is both known and tracked
    pub fn tracked_carrier(&self, raw_line: &str) -> Option<&str> {
        let canonical = self.canonical(raw_line)?;
        match &self.tracked {
            Some(tracked) if !tracked.contains(&fold(canonical)) => None,
            _ => Some(canonical),
        }
    }

    pub fn suppresses_empty(&self, canonical: &str) -> bool {
        self.suppress_if_empty.contains(&fold(canonical))
    }

    pub fn is_multi_segment(&self, canonical: &str) -> bool {
        self.multi_segment.contains(&fold(canonical))
    }

    /// Carrier-specific field to read the lookup identifier from
    pub fn key_field_override(&self, canonical: &str) -> Option<&str> {
        self.key_fields.get(&fold(canonical)).map(String::as_str)
    }

    /// Number of distinct canonical carriers
    pub fn carrier_count(&self) -> usize {
        self.surface_index.values().collect::<HashSet<_>>().len()
    }

    pub fn is_empty(&self) -> bool {
        self.surface_index.is_empty()
    }
}

impl From<CatalogSnapshot> for CarrierCatalog {
    fn from(snapshot: CatalogSnapshot) -> Self {
        Self::from_snapshot(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CarrierCatalog {
        CatalogSnapshot::new()
            .with_line("ARKAS", &["ARKAS", "Arkas Line"])
            .with_line("SINOKOR", &["СИНОКОР РУС ООО", "SINOKOR MERCHANT"])
            .with_line("MSC", &["MSC RUS"])
            .track("ARKAS")
            .track("SINOKOR")
            .suppress_if_empty("ARKAS")
            .key_field("SINOKOR", "container_number")
            .into()
    }

    #[test]
    fn test_surface_forms_map_to_canonical() {
        let catalog = catalog();
        assert_eq!(catalog.canonical("arkas line"), Some("ARKAS"));
        assert_eq!(catalog.canonical(" синокор рус ооо "), Some("SINOKOR"));
        assert_eq!(catalog.canonical("MSC"), Some("MSC"));
        assert_eq!(catalog.canonical("MAERSK"), None);
    }

    #[test]
    fn test_canonical_or_raw_falls_back() {
        let catalog = catalog();
        assert_eq!(catalog.canonical_or_raw("Arkas Line"), "ARKAS");
        assert_eq!(catalog.canonical_or_raw(" Maersk "), "Maersk");
    }

    #[test]
    fn test_only_tracked_subset_is_tracked() {
        let catalog = catalog();
        assert_eq!(catalog.tracked_carrier("ARKAS"), Some("ARKAS"));
        assert_eq!(catalog.tracked_carrier("MSC RUS"), None);
        assert_eq!(catalog.tracked_carrier("unknown"), None);
    }

    #[test]
    fn test_without_tracked_list_every_line_is_tracked() {
        let catalog: CarrierCatalog = CatalogSnapshot::new()
            .with_line("MSC", &["MSC RUS"])
            .into();
        assert_eq!(catalog.tracked_carrier("msc rus"), Some("MSC"));
    }

    #[test]
    fn test_carrier_rules() {
        let catalog = catalog();
        assert!(catalog.suppresses_empty("ARKAS"));
        assert!(!catalog.suppresses_empty("SINOKOR"));
        assert_eq!(catalog.key_field_override("SINOKOR"), Some("container_number"));
        assert_eq!(catalog.key_field_override("ARKAS"), None);
        assert_eq!(catalog.carrier_count(), 3);
    }

    #[test]
    fn test_snapshot_deserializes_with_defaults() {
        let snapshot: CatalogSnapshot = serde_json::from_str(
            r#"{"lines": {"ARKAS": ["ARKAS"]}, "suppress_if_empty": ["ARKAS"]}"#,
        )
        .unwrap();
        assert!(snapshot.tracked.is_none());
        assert!(snapshot.multi_segment.is_empty());
        let catalog = CarrierCatalog::from(snapshot);
        assert_eq!(catalog.tracked_carrier("ARKAS"), Some("ARKAS"));
    }
}
