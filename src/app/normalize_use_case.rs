use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;
use tracing::info;

use crate::app::ports::ReportSourcePort;
use crate::pipeline::processing::normalize::{ReportNormalizer, ReportOrigin};
use crate::types::ShipmentRow;

/// Use case for turning a back-office report file into canonical rows
pub struct NormalizeUseCase {
    source: Box<dyn ReportSourcePort>,
    normalizer: ReportNormalizer,
}

impl NormalizeUseCase {
    pub fn new(source: Box<dyn ReportSourcePort>, normalizer: ReportNormalizer) -> Self {
        Self { source, normalizer }
    }

    pub async fn normalize_file(&self, path: &Path) -> Result<Vec<ShipmentRow>> {
        let table = self
            .source
            .read_report(path)
            .await
            .with_context(|| format!("reading report {}", path.display()))?;

        let origin = ReportOrigin {
            file_name: report_name(path),
            parsed_on: Local::now().naive_local(),
        };
        let rows = self.normalizer.normalize(table, &origin);
        info!("Normalized {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }
}

/// File name a report's output is named after
pub fn report_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string())
}
