use crate::app::ports::CatalogSourcePort;
use crate::config::ReferenceConfig;
use crate::error::{EnrichError, Result};
use crate::pipeline::processing::carriers::CatalogSnapshot;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::info;

/// Carrier catalog read from the Postgres reference store.
///
/// Expects `line_unified(canonical, surface_form)` and
/// `line_tracking(canonical, suppress_if_empty, multi_segment, key_field)`.
pub struct PgCatalogSource {
    options: PgConnectOptions,
    display: String,
}

impl PgCatalogSource {
    pub fn from_config(config: &ReferenceConfig) -> Result<Self> {
        Ok(Self {
            options: config.connect_options()?,
            display: format!(
                "postgres {}:{}/{}",
                config.host.as_deref().unwrap_or_default(),
                config.port,
                config.database.as_deref().unwrap_or_default()
            ),
        })
    }
}

fn db_error(context: &str) -> impl Fn(sqlx::Error) -> EnrichError + '_ {
    move |e| EnrichError::Database {
        message: format!("{}: {}", context, e),
    }
}

#[async_trait]
impl CatalogSourcePort for PgCatalogSource {
    async fn load_catalog(&self) -> Result<CatalogSnapshot> {
        info!("Connecting to reference store at {}", self.display);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(self.options.clone())
            .await
            .map_err(db_error("Failed to connect to reference store"))?;

        let unified: Vec<(String, String)> =
            sqlx::query_as("SELECT canonical, surface_form FROM line_unified ORDER BY canonical")
                .fetch_all(&pool)
                .await
                .map_err(db_error("Failed to read line_unified"))?;

        let tracking: Vec<(String, bool, bool, Option<String>)> = sqlx::query_as(
            "SELECT canonical, suppress_if_empty, multi_segment, key_field FROM line_tracking",
        )
        .fetch_all(&pool)
        .await
        .map_err(db_error("Failed to read line_tracking"))?;

        pool.close().await;

        let mut snapshot = CatalogSnapshot::new();
        for (canonical, surface_form) in unified {
            snapshot.lines.entry(canonical).or_default().push(surface_form);
        }
        let tracked = snapshot.tracked.get_or_insert_with(Vec::new);
        for (canonical, suppress_if_empty, multi_segment, key_field) in tracking {
            if suppress_if_empty {
                snapshot.suppress_if_empty.push(canonical.clone());
            }
            if multi_segment {
                snapshot.multi_segment.push(canonical.clone());
            }
            if let Some(field) = key_field {
                snapshot.key_fields.insert(canonical.clone(), field);
            }
            tracked.push(canonical);
        }
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        self.display.clone()
    }
}
