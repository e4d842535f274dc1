//! Counters for the enrichment run.
//!
//! Recorded through the `metrics` facade; without an installed recorder every
//! call is a no-op.

/// Build a metric name from a phase and a short name
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("cpe_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("cpe_", $phase, "_", $name)
    };
}

/// Carrier catalog loading
pub struct CatalogMetrics;

impl CatalogMetrics {
    pub fn record_load_success(carriers: usize) {
        ::metrics::counter!(phase_metric!(counter, "catalog", "loads_success")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "catalog", "carriers")).record(carriers as f64);
    }

    pub fn record_load_error() {
        ::metrics::counter!(phase_metric!(counter, "catalog", "loads_error")).increment(1);
    }
}

/// Calls to the tracking service
pub struct LookupMetrics;

impl LookupMetrics {
    pub fn record_attempt() {
        ::metrics::counter!(phase_metric!(counter, "lookup", "attempts")).increment(1);
    }

    pub fn record_attempt_error(kind: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "lookup", "attempt_errors"), "kind" => kind)
            .increment(1);
    }

    pub fn record_resolved() {
        ::metrics::counter!(phase_metric!(counter, "lookup", "resolved")).increment(1);
    }

    pub fn record_not_found() {
        ::metrics::counter!(phase_metric!(counter, "lookup", "not_found")).increment(1);
    }

    pub fn record_exhausted() {
        ::metrics::counter!(phase_metric!(counter, "lookup", "exhausted")).increment(1);
    }
}

/// Per-row decisions of the resolver
pub struct ResolverMetrics;

impl ResolverMetrics {
    pub fn record_skip(reason: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "resolver", "rows_skipped"), "reason" => reason)
            .increment(1);
    }

    pub fn record_cache_hit() {
        ::metrics::counter!(phase_metric!(counter, "resolver", "cache_hits")).increment(1);
    }

    pub fn record_batch(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "resolver", "batches")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "resolver", "batch_size")).record(rows as f64);
    }
}
