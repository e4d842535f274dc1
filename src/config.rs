use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::constants;
use crate::error::{EnrichError, Result};
use crate::pipeline::lookup::RetryPolicy;

/// Runtime configuration: an optional TOML file overlaid by environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub reference: ReferenceConfig,
    pub eligibility: EligibilityConfig,
}

/// Where and how patiently to call the tracking service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            host: constants::DEFAULT_TRACKING_HOST.to_string(),
            port: constants::DEFAULT_TRACKING_PORT,
            timeout_secs: constants::DEFAULT_TIMEOUT_SECS,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            backoff_secs: constants::DEFAULT_BACKOFF_SECS,
        }
    }
}

impl TrackingConfig {
    /// Base URL the lookup requests are POSTed to
    pub fn endpoint(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("http://{}:{}", host, self.port)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_secs(self.backoff_secs),
        }
    }
}

/// Reference store holding the carrier catalog. Only read once, before any row is processed.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// JSON snapshot of the catalog; preferred over the database when set
    pub catalog_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            host: None,
            port: constants::DEFAULT_REFERENCE_DB_PORT,
            database: None,
            username: None,
            password: None,
        }
    }
}

impl fmt::Debug for ReferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceConfig")
            .field("catalog_path", &self.catalog_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ReferenceConfig {
    /// Host, database and username; all three are required to reach the store
    pub fn credentials(&self) -> Result<(&str, &str, &str)> {
        let missing = |name: &str| EnrichError::Config(format!("reference store {} is not configured", name));
        let host = self.host.as_deref().ok_or_else(|| missing("host"))?;
        let database = self.database.as_deref().ok_or_else(|| missing("database"))?;
        let username = self.username.as_deref().ok_or_else(|| missing("username"))?;
        Ok((host, database, username))
    }

    /// Connection options for the reference store. Credentials are passed as
    /// fields, never spliced into a URL, so reserved characters survive.
    #[cfg(feature = "postgres")]
    pub fn connect_options(&self) -> Result<sqlx::postgres::PgConnectOptions> {
        let (host, database, username) = self.credentials()?;
        let options = sqlx::postgres::PgConnectOptions::new()
            .host(host)
            .port(self.port)
            .database(database)
            .username(username);
        Ok(match self.password.as_deref() {
            Some(password) => options.password(password),
            None => options,
        })
    }

    pub fn has_database(&self) -> bool {
        self.host.is_some() && self.database.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EligibilityConfig {
    pub empty_container_marker: String,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            empty_container_marker: constants::DEFAULT_EMPTY_CONTAINER_MARKER.to_string(),
        }
    }
}

impl Config {
    /// Load the optional TOML file, then let the process environment override it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    EnrichError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
                })?;
                toml::from_str(&content)?
            }
            None => Config::default(),
        };
        config.apply_env(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides from any lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TRACKING_HOST") {
            self.tracking.host = v;
        }
        if let Some(v) = lookup("TRACKING_PORT") {
            self.tracking.port = parse_var("TRACKING_PORT", &v)?;
        }
        if let Some(v) = lookup("TRACKING_TIMEOUT_SECS") {
            self.tracking.timeout_secs = parse_var("TRACKING_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("TRACKING_MAX_ATTEMPTS") {
            self.tracking.max_attempts = parse_var("TRACKING_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("TRACKING_BACKOFF_SECS") {
            self.tracking.backoff_secs = parse_var("TRACKING_BACKOFF_SECS", &v)?;
        }

        if let Some(v) = lookup("REFERENCE_CATALOG_PATH") {
            self.reference.catalog_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("REFERENCE_DB_HOST") {
            self.reference.host = Some(v);
        }
        if let Some(v) = lookup("REFERENCE_DB_PORT") {
            self.reference.port = parse_var("REFERENCE_DB_PORT", &v)?;
        }
        if let Some(v) = lookup("REFERENCE_DB_NAME") {
            self.reference.database = Some(v);
        }
        if let Some(v) = lookup("REFERENCE_DB_USER") {
            self.reference.username = Some(v);
        }
        if let Some(v) = lookup("REFERENCE_DB_PASSWORD") {
            self.reference.password = Some(v);
        }

        if let Some(v) = lookup("EMPTY_CONTAINER_MARKER") {
            self.eligibility.empty_container_marker = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.tracking.max_attempts == 0 {
            return Err(EnrichError::Config(
                "tracking.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.tracking.host.trim().is_empty() {
            return Err(EnrichError::Config("tracking.host is empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EnrichError::Config(format!("{} has invalid value '{}': {}", name, value, e)))
}
