// Adapters implementing the application ports

pub mod catalog_adapter;
pub mod enrich_output_adapter;
pub mod http_client;
#[cfg(feature = "postgres")]
pub mod pg_catalog_adapter;
pub mod report_reader;
