//! TOML configuration parsing and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::environment::EnvironmentLoader;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Storage backend settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Storage backend configuration (`[database]` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Backend engine: "memory" or "documentdb"
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Connection string for remote engines
    #[serde(default)]
    pub url: Option<String>,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection holding the records
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Upper bound for requested page sizes
    #[serde(default = "default_page_limit")]
    pub page_limit: u64,
    /// Sweep period for engines without native expiry (seconds)
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Maximum records reclaimed per sweep
    #[serde(default = "default_cleanup_limit")]
    pub cleanup_limit: u64,
    /// Secret used to encrypt stored values; plaintext storage when absent
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_engine() -> String {
    "memory".to_string()
}

fn default_database() -> String {
    "fedstore".to_string()
}

fn default_collection() -> String {
    "records".to_string()
}

fn default_page_limit() -> u64 {
    50
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_cleanup_limit() -> u64 {
    1000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            url: None,
            database: default_database(),
            collection: default_collection(),
            page_limit: default_page_limit(),
            cleanup_interval_seconds: default_cleanup_interval(),
            cleanup_limit: default_cleanup_limit(),
            encryption_key: None,
        }
    }
}

/// Configuration loader
#[derive(Debug, Clone)]
pub struct ConfigurationLoader {
    /// File the configuration was read from, if any
    pub config_path: Option<PathBuf>,
    /// Loaded configuration
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses default config.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Self::load_config(path)?,
            None => Configuration::default(),
        };

        Ok(Self {
            config_path: config_path.map(|p| p.to_path_buf()),
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config_path: None,
            config,
        }
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Let `FEDSTORE_DB_*` environment variables override file values.
    pub fn apply_env_overrides(&mut self, env: &EnvironmentLoader) -> Result<()> {
        let db = &mut self.config.database;
        if let Some(engine) = env.db_engine() {
            db.engine = engine;
        }
        if let Some(url) = env.db_url() {
            db.url = Some(url);
        }
        if let Some(name) = env.db_name() {
            db.database = name;
        }
        if let Some(collection) = env.db_collection() {
            db.collection = collection;
        }
        if let Some(limit) = env.db_page_limit() {
            db.page_limit = limit
                .parse()
                .with_context(|| format!("Invalid FEDSTORE_DB_PAGE_LIMIT: {}", limit))?;
        }
        if let Some(key) = env.db_encryption_key() {
            db.encryption_key = Some(key);
        }
        Ok(())
    }

    /// Database section of the loaded configuration
    pub fn database(&self) -> &DatabaseConfig {
        &self.config.database
    }
}
