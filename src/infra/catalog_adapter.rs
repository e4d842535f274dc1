use crate::app::ports::CatalogSourcePort;
use crate::error::{EnrichError, Result};
use crate::pipeline::processing::carriers::CatalogSnapshot;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// Catalog snapshot exported from the reference store as a JSON file
pub struct JsonCatalogSource {
    path: PathBuf,
}

impl JsonCatalogSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CatalogSourcePort for JsonCatalogSource {
    async fn load_catalog(&self) -> Result<CatalogSnapshot> {
        let content = fs::read_to_string(&self.path).map_err(|e| EnrichError::Catalog {
            message: format!("Failed to read catalog file {}: {}", self.path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| EnrichError::Catalog {
            message: format!("Failed to parse catalog file {}: {}", self.path.display(), e),
        })
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
