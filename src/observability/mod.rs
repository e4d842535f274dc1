// Observability: metric recording grouped by pipeline phase

pub mod metrics;

pub use metrics::{CatalogMetrics, LookupMetrics, ResolverMetrics};
