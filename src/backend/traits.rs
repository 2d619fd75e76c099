//! Storage Backend Traits
//!
//! Defines the contract every namespaced record store must satisfy, the
//! request/response types shared by all backends, and the builder that
//! selects a backend at configuration time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::codec::DEFAULT_PAGE_LIMIT;
use super::memory_backend::{MemoryOptions, MemoryStorageBackend};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error types for storage operations
///
/// A missing record is never an error: `get` answers `None` and deletes are
/// idempotent.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Connection error (engine unreachable, authentication failure)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed namespace, key or index descriptor
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Value could not be sealed or opened
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Generic backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Secondary index descriptor supplied by the caller on `put`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    /// Index name (e.g. "email", "tenantProduct")
    pub name: String,
    /// Indexed value
    pub value: String,
}

impl Index {
    /// Create a new index descriptor
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Pagination arguments for `get_all` / `get_by_index`
///
/// Offset and limit only take effect when both are present; otherwise the
/// full result set is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Number of records to skip
    pub offset: Option<u64>,
    /// Maximum number of records to return
    pub limit: Option<u64>,
    /// Opaque continuation token for token-paginated engines
    pub page_token: Option<String>,
}

impl PageRequest {
    /// Request the full, unbounded result set
    pub fn all() -> Self {
        Self::default()
    }

    /// Request one offset/limit page
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset: Some(offset),
            limit: Some(limit),
            page_token: None,
        }
    }

    /// Attach a continuation token
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

/// A page of results, newest-created first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Records<T> {
    /// Values in this page
    pub data: Vec<T>,
    /// Continuation token for the next page (if the engine uses tokens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl<T> Default for Records<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            page_token: None,
        }
    }
}

impl<T> Records<T> {
    /// Wrap a list of values without a continuation token
    pub fn new(data: Vec<T>) -> Self {
        Self {
            data,
            page_token: None,
        }
    }

    /// Number of values in this page
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether this page is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Transform every value, keeping the continuation token
    pub fn map<U, F>(self, f: F) -> Records<U>
    where
        F: FnMut(T) -> U,
    {
        Records {
            data: self.data.into_iter().map(f).collect(),
            page_token: self.page_token,
        }
    }

    /// Transform every value, stopping at the first failure
    pub fn try_map<U, E, F>(self, f: F) -> Result<Records<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(Records {
            data: self.data.into_iter().map(f).collect::<Result<_, _>>()?,
            page_token: self.page_token,
        })
    }
}

/// Core trait for storage backends
///
/// Every operation is scoped to a namespace. Records are addressed by the
/// identifier derived from `(namespace, key)`, carry an opaque value, an
/// index token set and an optional expiry. Expired records are never
/// served, whether or not the engine has physically reclaimed them yet.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get the backend type name (e.g., "memory", "documentdb")
    fn backend_type(&self) -> &'static str;

    /// Check if the backend is available/connected
    async fn is_available(&self) -> bool;

    /// Read the value stored under `key`, or `None` if missing or expired
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// List the unexpired values of a namespace, newest-created first
    async fn get_all(&self, namespace: &str, page: &PageRequest)
        -> StorageResult<Records<Vec<u8>>>;

    /// List the unexpired values tagged with `index`, newest-created first
    async fn get_by_index(
        &self,
        namespace: &str,
        index: &Index,
        page: &PageRequest,
    ) -> StorageResult<Records<Vec<u8>>>;

    /// Insert or replace a record
    ///
    /// `ttl_seconds == 0` means the record never expires. The index set
    /// replaces the previous one entirely. `createdAt` is only set on insert.
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
        indexes: &[Index],
    ) -> StorageResult<()>;

    /// Delete a record; returns whether a live record was removed
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Delete several records in one batch; returns how many were removed
    async fn delete_many(&self, namespace: &str, keys: &[String]) -> StorageResult<u64>;

    /// Release the connection and stop background work
    async fn close(&self) -> StorageResult<()>;
}

/// Builder for creating storage backends from configuration
pub struct StorageBackendBuilder {
    backend_type: String,
    config: HashMap<String, String>,
}

impl StorageBackendBuilder {
    /// Create a new builder
    pub fn new(backend_type: &str) -> Self {
        Self {
            backend_type: backend_type.to_string(),
            config: HashMap::new(),
        }
    }

    /// Create a builder from the `[database]` configuration table
    #[cfg(feature = "config")]
    pub fn from_config(config: &crate::config::DatabaseConfig) -> Self {
        let mut builder = Self::new(&config.engine)
            .with_option("page_limit", &config.page_limit.to_string())
            .with_option(
                "cleanup_interval_seconds",
                &config.cleanup_interval_seconds.to_string(),
            )
            .with_option("cleanup_limit", &config.cleanup_limit.to_string())
            .with_option("database", &config.database)
            .with_option("collection", &config.collection);
        if let Some(url) = &config.url {
            builder = builder.with_option("url", url);
        }
        builder
    }

    /// Add a configuration option
    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.config.insert(key.to_string(), value.to_string());
        self
    }

    /// Set the connection string (for remote backends)
    pub fn with_url(self, url: &str) -> Self {
        self.with_option("url", url)
    }

    fn numeric_option(&self, key: &str, default: u64) -> StorageResult<u64> {
        match self.config.get(key) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                StorageError::Configuration(format!("{} must be a non-negative integer", key))
            }),
            None => Ok(default),
        }
    }

    /// Build the storage backend
    ///
    /// Remote backends connect and create their supporting indexes here; a
    /// failure means the backend is not ready and is returned as an error.
    pub async fn build(self) -> StorageResult<Arc<dyn StorageBackend>> {
        let page_limit = self.numeric_option("page_limit", DEFAULT_PAGE_LIMIT)?;
        if page_limit == 0 {
            return Err(StorageError::Configuration(
                "page_limit must be greater than zero".into(),
            ));
        }
        match self.backend_type.as_str() {
            "memory" | "mem" => {
                let defaults = MemoryOptions::default();
                let sweep_secs = self.numeric_option(
                    "cleanup_interval_seconds",
                    defaults.sweep_interval.as_secs(),
                )?;
                let cleanup_limit =
                    self.numeric_option("cleanup_limit", defaults.cleanup_limit as u64)?;
                let options = MemoryOptions {
                    page_limit,
                    sweep_interval: Duration::from_secs(sweep_secs),
                    cleanup_limit: cleanup_limit as usize,
                };
                Ok(Arc::new(MemoryStorageBackend::with_options(options)?))
            }
            #[cfg(feature = "storage-documentdb")]
            "documentdb" | "mongodb" | "mongo" => {
                let url = self
                    .config
                    .get("url")
                    .ok_or_else(|| StorageError::Configuration("url is required".into()))?;
                let database = self
                    .config
                    .get("database")
                    .map(String::as_str)
                    .unwrap_or(super::DEFAULT_DATABASE);
                let collection = self
                    .config
                    .get("collection")
                    .map(String::as_str)
                    .unwrap_or(super::DEFAULT_COLLECTION);
                let backend =
                    super::DocumentDBStorageBackend::connect(url, database, collection)
                        .await?
                        .with_page_limit(page_limit)?;
                Ok(Arc::new(backend))
            }
            unknown => Err(StorageError::Configuration(format!(
                "Unknown backend type: {}",
                unknown
            ))),
        }
    }
}
