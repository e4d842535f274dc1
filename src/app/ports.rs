use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::Result;
use crate::pipeline::lookup::LookupRequest;
use crate::pipeline::processing::carriers::CatalogSnapshot;
use crate::pipeline::processing::normalize::RawTable;
use crate::types::ShipmentRow;

/// Failure of a single call to the tracking service. Every variant is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("tracking service answered HTTP {0}")]
    Status(u16),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("undecodable response body: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout => "timeout",
            TransportError::Status(_) => "status",
            TransportError::Connection(_) => "connection",
            TransportError::Decode(_) => "decode",
        }
    }
}

/// Remote port-of-loading lookup
#[async_trait]
pub trait TrackingServicePort: Send + Sync {
    /// POST one lookup request; a 2xx answer yields its decoded JSON body
    async fn post_lookup(&self, request: &LookupRequest) -> std::result::Result<Value, TransportError>;
}

/// Reference store the carrier catalog is read from
#[async_trait]
pub trait CatalogSourcePort: Send + Sync {
    async fn load_catalog(&self) -> Result<CatalogSnapshot>;

    /// Human readable origin for log lines
    fn describe(&self) -> String;
}

/// Reader for incoming shipment reports
#[async_trait]
pub trait ReportSourcePort: Send + Sync {
    async fn read_report(&self, path: &Path) -> Result<RawTable>;
}

/// Destination for finished rows
#[async_trait]
pub trait RowSinkPort: Send + Sync {
    /// Write `rows` under the report name, returning where they landed
    async fn write_rows(&self, report_name: &str, rows: &[ShipmentRow]) -> Result<PathBuf>;
}
