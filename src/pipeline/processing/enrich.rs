use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::constants::{
    FIELD_DIRECTION, FIELD_IS_AUTO_TRACKING, FIELD_IS_AUTO_TRACKING_OK, FIELD_LINE,
    FIELD_TRACKING_SEAPORT, OUTPUT_FIELDS,
};
use crate::observability::ResolverMetrics;
use crate::pipeline::lookup::{LookupClient, LookupOutcome};
use crate::pipeline::processing::carriers::CarrierCatalog;
use crate::pipeline::processing::consignment::LookupKey;
use crate::pipeline::processing::eligibility::{Eligibility, EligibilityFilter, SkipReason};
use crate::types::{Direction, ShipmentRow};

/// The three output fields as decided for one lookup key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionCacheEntry {
    pub tracking_seaport: Option<String>,
    pub is_auto_tracking: bool,
    pub is_auto_tracking_ok: bool,
}

impl ResolutionCacheEntry {
    pub fn from_outcome(outcome: &LookupOutcome) -> Self {
        let tracking_seaport = outcome.port().map(str::to_string);
        Self {
            is_auto_tracking: true,
            is_auto_tracking_ok: tracking_seaport.is_some(),
            tracking_seaport,
        }
    }

    /// Write the entry onto a row
    pub fn apply(&self, row: &mut ShipmentRow) {
        row.set(FIELD_IS_AUTO_TRACKING, Value::Bool(self.is_auto_tracking));
        row.set(FIELD_IS_AUTO_TRACKING_OK, Value::Bool(self.is_auto_tracking_ok));
        row.set(
            FIELD_TRACKING_SEAPORT,
            self.tracking_seaport.clone().map_or(Value::Null, Value::String),
        );
    }
}

/// Resolutions made during one batch, keyed by lookup identifier. Never outlives the batch.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: HashMap<String, ResolutionCacheEntry>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ResolutionCacheEntry> {
        self.entries.get(key)
    }

    /// Record the first resolution for a key. Later inserts for the same key are ignored.
    pub fn insert(&mut self, key: String, entry: ResolutionCacheEntry) -> &ResolutionCacheEntry {
        self.entries.entry(key).or_insert(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Summary of one resolver pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    pub rows: usize,
    pub eligible: usize,
    pub skipped: BTreeMap<&'static str, usize>,
    /// Distinct keys sent to the tracking service
    pub lookups: usize,
    /// Eligible rows served from the batch cache
    pub cache_hits: usize,
    /// Eligible rows that ended with a port
    pub resolved: usize,
    pub unresolved: usize,
}

impl ResolveStats {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason.as_str()).or_default() += 1;
        ResolverMetrics::record_skip(reason.as_str());
    }

    fn merged(&mut self, entry: &ResolutionCacheEntry) {
        if entry.is_auto_tracking_ok {
            self.resolved += 1;
        } else {
            self.unresolved += 1;
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Enrichment resolver: decides, deduplicates, looks up and merges tracking ports for a batch.
///
/// Rows are processed strictly in order with at most one lookup in flight, so
/// the first row seen for a key decides what every later row with that key gets.
pub struct EnrichmentResolver {
    filter: EligibilityFilter,
    client: LookupClient,
}

impl EnrichmentResolver {
    pub fn new(filter: EligibilityFilter, client: LookupClient) -> Self {
        Self { filter, client }
    }

    pub async fn resolve_and_merge(
        &self,
        rows: &mut [ShipmentRow],
        catalog: &CarrierCatalog,
    ) -> ResolveStats {
        let mut cache = ResolutionCache::new();
        let mut stats = ResolveStats {
            rows: rows.len(),
            ..Default::default()
        };
        ResolverMetrics::record_batch(rows.len());

        for (index, row) in rows.iter_mut().enumerate() {
            let carrier = match self.filter.evaluate(row, catalog) {
                Eligibility::Eligible { carrier } => carrier,
                Eligibility::Skip(reason) => {
                    debug!(row = index, reason = reason.as_str(), "row not tracked");
                    stats.skip(reason);
                    continue;
                }
            };

            let Some(key) = LookupKey::extract(row, catalog, carrier) else {
                debug!(row = index, carrier, "row has no lookup identifier");
                stats.skip(SkipReason::MissingKey);
                continue;
            };
            stats.eligible += 1;

            let cache_key = key.cache_key().to_string();
            if let Some(entry) = cache.get(&cache_key) {
                debug!(row = index, key = %cache_key, "lookup served from batch cache");
                ResolverMetrics::record_cache_hit();
                stats.cache_hits += 1;
                entry.apply(row);
                stats.merged(entry);
                continue;
            }

            let line = row.text(FIELD_LINE).unwrap_or_else(|| carrier.to_string());
            let direction = Direction::from_field(row.text(FIELD_DIRECTION).as_deref());
            debug!(row = index, carrier, key = %cache_key, field = %key.field, "looking up port");

            let outcome = self.client.resolve_key(catalog, &line, &key, &direction).await;
            stats.lookups += 1;

            let entry = cache.insert(cache_key, ResolutionCacheEntry::from_outcome(&outcome));
            entry.apply(row);
            stats.merged(entry);
        }

        info!(
            rows = stats.rows,
            eligible = stats.eligible,
            skipped = stats.skipped_total(),
            lookups = stats.lookups,
            cache_hits = stats.cache_hits,
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            "batch resolved"
        );
        stats
    }
}

/// Give every row the output columns, null where the resolver left them alone
pub fn ensure_output_fields(rows: &mut [ShipmentRow]) {
    for row in rows {
        for field in OUTPUT_FIELDS {
            row.ensure_field(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{TrackingServicePort, TransportError};
    use crate::pipeline::lookup::{LookupRequest, RetryPolicy};
    use crate::pipeline::processing::carriers::CatalogSnapshot;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct RecordingTracker {
        answers: HashMap<String, Value>,
        calls: Mutex<Vec<LookupRequest>>,
    }

    impl RecordingTracker {
        fn new(answers: &[(&str, Value)]) -> Arc<Self> {
            Arc::new(Self {
                answers: answers.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TrackingServicePort for RecordingTracker {
        async fn post_lookup(&self, request: &LookupRequest) -> Result<Value, TransportError> {
            self.calls.lock().unwrap().push(request.clone());
            self.answers
                .get(&request.consignment)
                .cloned()
                .ok_or_else(|| TransportError::Connection("refused".to_string()))
        }
    }

    fn catalog() -> CarrierCatalog {
        CatalogSnapshot::new()
            .with_line("ARKAS", &["ARKAS"])
            .with_line("MSC", &["MSC"])
            .track("ARKAS")
            .suppress_if_empty("ARKAS")
            .into()
    }

    fn resolver(tracker: Arc<RecordingTracker>) -> EnrichmentResolver {
        EnrichmentResolver::new(
            EligibilityFilter::new("ПОРОЖ"),
            LookupClient::new(tracker, RetryPolicy::default()),
        )
    }

    fn rows(values: Vec<Value>) -> Vec<ShipmentRow> {
        values.into_iter().map(|v| ShipmentRow::try_from(v).unwrap()).collect()
    }

    #[test]
    fn test_cache_keeps_first_entry() {
        let mut cache = ResolutionCache::new();
        let first = ResolutionCacheEntry::from_outcome(&LookupOutcome::Resolved("BUSAN".into()));
        let second = ResolutionCacheEntry::from_outcome(&LookupOutcome::NotFound);
        cache.insert("C1".into(), first.clone());
        cache.insert("C1".into(), second);
        assert_eq!(cache.get("C1"), Some(&first));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("C2").is_none());
    }

    #[test]
    fn test_entry_from_outcome() {
        let exhausted = ResolutionCacheEntry::from_outcome(&LookupOutcome::Exhausted { attempts: 3 });
        assert!(exhausted.is_auto_tracking);
        assert!(!exhausted.is_auto_tracking_ok);
        assert_eq!(exhausted.tracking_seaport, None);
    }

    #[tokio::test]
    async fn test_rows_sharing_a_key_trigger_one_lookup() {
        let tracker = RecordingTracker::new(&[("C1", json!("BUSAN"))]);
        let mut batch = rows(vec![
            json!({"line": "ARKAS", "consignment": "C1", "direction": "import", "tracking_seaport": null}),
            json!({"line": "ARKAS", "consignment": "C1", "direction": "export", "tracking_seaport": null}),
            json!({"line": "ARKAS", "consignment": "C1, C9", "direction": "import"}),
        ]);

        let stats = resolver(tracker.clone()).resolve_and_merge(&mut batch, &catalog()).await;

        assert_eq!(tracker.call_count(), 1);
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.resolved, 3);
        for row in &batch {
            assert_eq!(row.get("tracking_seaport"), Some(&json!("BUSAN")));
            assert_eq!(row.get("is_auto_tracking"), Some(&json!(true)));
            assert_eq!(row.get("is_auto_tracking_ok"), Some(&json!(true)));
        }
    }

    #[tokio::test]
    async fn test_ineligible_rows_are_untouched() {
        let tracker = RecordingTracker::new(&[("C1", json!("BUSAN"))]);
        let mut batch = rows(vec![
            json!({"line": "MSC", "consignment": "C1"}),
            json!({"line": "ARKAS", "consignment": "C1", "enforce_auto_tracking": false}),
            json!({"line": "ARKAS", "consignment": "C1", "goods_name": "КОНТЕЙНЕР ПОРОЖНИЙ"}),
            json!({"line": "ARKAS", "consignment": "C1", "tracking_seaport": "VOSTOCHNY"}),
            json!({"line": "ARKAS"}),
        ]);
        let before = batch.clone();

        let stats = resolver(tracker.clone()).resolve_and_merge(&mut batch, &catalog()).await;

        assert_eq!(tracker.call_count(), 0);
        assert_eq!(batch, before);
        assert_eq!(stats.eligible, 0);
        assert_eq!(stats.skipped_total(), 5);
        assert_eq!(stats.skipped.get("untracked_line"), Some(&1));
        assert_eq!(stats.skipped.get("tracking_disabled"), Some(&1));
        assert_eq!(stats.skipped.get("empty_container"), Some(&1));
        assert_eq!(stats.skipped.get("already_resolved"), Some(&1));
        assert_eq!(stats.skipped.get("missing_key"), Some(&1));
    }

    #[tokio::test]
    async fn test_not_found_marks_attempt_without_port() {
        let tracker = RecordingTracker::new(&[("C2", json!(""))]);
        let mut batch = rows(vec![json!({"line": "ARKAS", "consignment": "C2"})]);

        let stats = resolver(tracker).resolve_and_merge(&mut batch, &catalog()).await;

        assert_eq!(stats.unresolved, 1);
        assert_eq!(batch[0].get("is_auto_tracking"), Some(&json!(true)));
        assert_eq!(batch[0].get("is_auto_tracking_ok"), Some(&json!(false)));
        assert!(!batch[0].is_set("tracking_seaport"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_lookup_is_cached_for_the_batch() {
        let tracker = RecordingTracker::new(&[]);
        let mut batch = rows(vec![
            json!({"line": "ARKAS", "consignment": "DOWN"}),
            json!({"line": "ARKAS", "consignment": "DOWN"}),
        ]);

        let stats = resolver(tracker.clone()).resolve_and_merge(&mut batch, &catalog()).await;

        // one key, three attempts, no second round for the duplicate row
        assert_eq!(tracker.call_count(), 3);
        assert_eq!(stats.lookups, 1);
        assert_eq!(stats.unresolved, 2);
        assert_eq!(batch[1].get("is_auto_tracking"), Some(&json!(true)));
        assert_eq!(batch[1].get("is_auto_tracking_ok"), Some(&json!(false)));
    }

    #[test]
    fn test_ensure_output_fields() {
        let mut batch = rows(vec![json!({"line": "MSC", "tracking_seaport": "BUSAN"})]);
        ensure_output_fields(&mut batch);
        let map = batch.remove(0).into_map();
        assert_eq!(map.get("tracking_seaport"), Some(&json!("BUSAN")));
        assert_eq!(map.get("is_auto_tracking"), Some(&Value::Null));
        assert_eq!(map.get("is_auto_tracking_ok"), Some(&Value::Null));
    }
}
