use crate::app::ports::RowSinkPort;
use crate::error::{EnrichError, Result};
use crate::types::ShipmentRow;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes each report as `<output_dir>/<report name>.json`, a pretty JSON array
pub struct JsonFileRowSink {
    output_dir: PathBuf,
}

impl JsonFileRowSink {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl RowSinkPort for JsonFileRowSink {
    async fn write_rows(&self, report_name: &str, rows: &[ShipmentRow]) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.json", report_name));

        let mut writer = BufWriter::new(fs::File::create(&path)?);
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        rows.serialize(&mut serializer)?;
        writer.flush()?;

        info!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

/// Read a JSON array of already normalized rows
pub fn read_rows(path: &Path) -> Result<Vec<ShipmentRow>> {
    let content = fs::read_to_string(path)?;
    let rows: Vec<ShipmentRow> = serde_json::from_str(&content).map_err(|e| EnrichError::Input {
        message: format!("{} is not a JSON array of rows: {}", path.display(), e),
    })?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_written_rows_read_back() {
        let dir = tempdir().unwrap();
        let sink = JsonFileRowSink::new(dir.path().join("out"));
        let rows = vec![ShipmentRow::try_from(json!({"line": "СИНОКОР", "tracking_seaport": null})).unwrap()];

        let path = sink.write_rows("report.xlsx", &rows).await.unwrap();

        assert!(path.ends_with("report.xlsx.json"));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("СИНОКОР"));
        assert!(text.contains("\n        \"line\""));
        assert_eq!(read_rows(&path).unwrap(), rows);
    }

    #[test]
    fn test_non_array_input_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.json");
        fs::write(&path, r#"{"line": "ARKAS"}"#).unwrap();
        assert!(matches!(read_rows(&path), Err(EnrichError::Input { .. })));
    }
}
