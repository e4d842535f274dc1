use anyhow::{Context, Result};
use tracing::{error, info};

use crate::app::ports::CatalogSourcePort;
use crate::error::EnrichError;
use crate::observability::CatalogMetrics;
use crate::pipeline::processing::carriers::CarrierCatalog;
use crate::pipeline::processing::enrich::{ensure_output_fields, EnrichmentResolver, ResolveStats};
use crate::types::ShipmentRow;

/// Use case for annotating shipment rows with tracked ports of loading
pub struct EnrichUseCase {
    catalog_source: Box<dyn CatalogSourcePort>,
    resolver: EnrichmentResolver,
}

impl EnrichUseCase {
    pub fn new(catalog_source: Box<dyn CatalogSourcePort>, resolver: EnrichmentResolver) -> Self {
        Self {
            catalog_source,
            resolver,
        }
    }

    /// Load the carrier catalog for this run. Any failure here must stop the run
    /// before a single row is processed.
    pub async fn load_catalog(&self) -> Result<CarrierCatalog> {
        let origin = self.catalog_source.describe();
        let snapshot = match self.catalog_source.load_catalog().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                CatalogMetrics::record_load_error();
                error!("Carrier catalog load from {} failed: {}", origin, e);
                return Err(e).with_context(|| format!("loading carrier catalog from {}", origin));
            }
        };

        let catalog = CarrierCatalog::from_snapshot(snapshot);
        if catalog.is_empty() {
            CatalogMetrics::record_load_error();
            return Err(EnrichError::Catalog {
                message: format!("catalog from {} lists no carriers", origin),
            })
            .context("validating carrier catalog");
        }

        CatalogMetrics::record_load_success(catalog.carrier_count());
        info!("Loaded {} carriers from {}", catalog.carrier_count(), origin);
        Ok(catalog)
    }

    /// Enrich one batch in place; every row ends up carrying the output columns
    pub async fn enrich_batch(&self, rows: &mut [ShipmentRow], catalog: &CarrierCatalog) -> ResolveStats {
        let stats = self.resolver.resolve_and_merge(rows, catalog).await;
        ensure_output_fields(rows);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{TrackingServicePort, TransportError};
    use crate::pipeline::lookup::{LookupClient, LookupRequest, RetryPolicy};
    use crate::pipeline::processing::carriers::CatalogSnapshot;
    use crate::pipeline::processing::eligibility::EligibilityFilter;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticCatalog(Option<CatalogSnapshot>);

    #[async_trait]
    impl CatalogSourcePort for StaticCatalog {
        async fn load_catalog(&self) -> crate::error::Result<CatalogSnapshot> {
            self.0.clone().ok_or_else(|| EnrichError::Catalog {
                message: "connection refused".to_string(),
            })
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    struct CountingTracker(AtomicUsize);

    #[async_trait]
    impl TrackingServicePort for CountingTracker {
        async fn post_lookup(&self, _request: &LookupRequest) -> std::result::Result<Value, TransportError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(json!("BUSAN"))
        }
    }

    fn use_case(snapshot: Option<CatalogSnapshot>, tracker: Arc<CountingTracker>) -> EnrichUseCase {
        EnrichUseCase::new(
            Box::new(StaticCatalog(snapshot)),
            EnrichmentResolver::new(
                EligibilityFilter::new("ПОРОЖ"),
                LookupClient::new(tracker, RetryPolicy::default()),
            ),
        )
    }

    #[tokio::test]
    async fn test_catalog_failure_is_fatal() {
        let tracker = Arc::new(CountingTracker(AtomicUsize::new(0)));
        let err = use_case(None, tracker).load_catalog().await.unwrap_err();
        assert!(format!("{:#}", err).contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_rejected() {
        let tracker = Arc::new(CountingTracker(AtomicUsize::new(0)));
        assert!(use_case(Some(CatalogSnapshot::new()), tracker).load_catalog().await.is_err());
    }

    #[tokio::test]
    async fn test_enrich_batch_fills_output_columns() {
        let tracker = Arc::new(CountingTracker(AtomicUsize::new(0)));
        let use_case = use_case(
            Some(CatalogSnapshot::new().with_line("ARKAS", &["ARKAS"])),
            tracker.clone(),
        );
        let catalog = use_case.load_catalog().await.unwrap();
        let mut rows = vec![
            ShipmentRow::try_from(json!({"line": "ARKAS", "consignment": "C1"})).unwrap(),
            ShipmentRow::try_from(json!({"line": "MSC", "consignment": "M1"})).unwrap(),
        ];

        let stats = use_case.enrich_batch(&mut rows, &catalog).await;

        assert_eq!(stats.lookups, 1);
        assert_eq!(tracker.0.load(Ordering::SeqCst), 1);
        assert_eq!(rows[0].get("tracking_seaport"), Some(&json!("BUSAN")));
        let untouched = rows[1].clone().into_map();
        assert_eq!(untouched.get("is_auto_tracking"), Some(&Value::Null));
    }
}
