use crate::constants::{
    FIELD_ENFORCE_AUTO_TRACKING, FIELD_GOODS_NAME, FIELD_LINE, FIELD_TRACKING_SEAPORT,
};
use crate::pipeline::processing::carriers::CarrierCatalog;
use crate::types::ShipmentRow;

/// Why a row is left out of automatic tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// `tracking_seaport` already holds a value
    AlreadyResolved,
    /// `enforce_auto_tracking` is explicitly false
    TrackingDisabled,
    MissingLine,
    /// Carrier is unknown or not in the tracked subset
    UntrackedLine,
    /// Empty-container move of a carrier that suppresses those
    EmptyContainer,
    /// No usable identifier in the lookup key field
    MissingKey,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyResolved => "already_resolved",
            SkipReason::TrackingDisabled => "tracking_disabled",
            SkipReason::MissingLine => "missing_line",
            SkipReason::UntrackedLine => "untracked_line",
            SkipReason::EmptyContainer => "empty_container",
            SkipReason::MissingKey => "missing_key",
        }
    }
}

/// Outcome of the eligibility check for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility<'c> {
    /// The row should be looked up for this canonical carrier
    Eligible { carrier: &'c str },
    Skip(SkipReason),
}

impl Eligibility<'_> {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }
}

/// Decides per row whether a tracking lookup should be attempted. Pure: never touches the row.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    empty_marker: Option<String>,
}

impl EligibilityFilter {
    pub fn new(empty_container_marker: &str) -> Self {
        let marker = empty_container_marker.trim().to_uppercase();
        Self {
            empty_marker: (!marker.is_empty()).then_some(marker),
        }
    }

    pub fn evaluate<'c>(&self, row: &ShipmentRow, catalog: &'c CarrierCatalog) -> Eligibility<'c> {
        if row.is_set(FIELD_TRACKING_SEAPORT) {
            return Eligibility::Skip(SkipReason::AlreadyResolved);
        }
        if row.flag(FIELD_ENFORCE_AUTO_TRACKING) == Some(false) {
            return Eligibility::Skip(SkipReason::TrackingDisabled);
        }
        let Some(line) = row.text(FIELD_LINE) else {
            return Eligibility::Skip(SkipReason::MissingLine);
        };
        let Some(carrier) = catalog.tracked_carrier(&line) else {
            return Eligibility::Skip(SkipReason::UntrackedLine);
        };
        if catalog.suppresses_empty(carrier) && self.is_empty_container(row) {
            return Eligibility::Skip(SkipReason::EmptyContainer);
        }
        Eligibility::Eligible { carrier }
    }

    pub fn is_eligible(&self, row: &ShipmentRow, catalog: &CarrierCatalog) -> bool {
        self.evaluate(row, catalog).is_eligible()
    }

    fn is_empty_container(&self, row: &ShipmentRow) -> bool {
        match (&self.empty_marker, row.text(FIELD_GOODS_NAME)) {
            (Some(marker), Some(goods)) => goods.to_uppercase().contains(marker.as_str()),
            _ => false,
        }
    }
}
