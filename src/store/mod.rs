//! Namespaced, typed stores over a [`StorageBackend`]
//!
//! A [`Store`] is bound to one namespace and exchanges `serde` values with
//! its callers. Values are serialized as JSON and, when an [`Encrypter`] is
//! configured, sealed before they are handed to the backend, which only ever
//! sees opaque bytes.
//!
//! ```rust,no_run
//! use fedstore::backend::{Index, MemoryStorageBackend, PageRequest};
//! use fedstore::store::Database;
//! use std::sync::Arc;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let db = Database::new(Arc::new(MemoryStorageBackend::new()?), None);
//!     let connections = db.store("saml:config");
//!
//!     connections
//!         .put("abc", &serde_json::json!({ "tenant": "acme" }), &[Index::new("tenant", "acme")])
//!         .await?;
//!     let page = connections
//!         .get_all::<serde_json::Value>(&PageRequest::new(0, 20))
//!         .await?;
//!     Ok(())
//! }
//! ```

mod encryption;

pub use encryption::Encrypter;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{Index, PageRequest, Records, StorageBackend, StorageError, StorageResult};

/// Owns the backend handle and hands out namespaced stores
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn StorageBackend>,
    encrypter: Option<Encrypter>,
}

impl Database {
    /// Wrap an already initialized backend
    pub fn new(backend: Arc<dyn StorageBackend>, encrypter: Option<Encrypter>) -> Self {
        Self { backend, encrypter }
    }

    /// Build the configured backend and encrypter
    ///
    /// Fails if the backend cannot be reached or prepared.
    #[cfg(feature = "config")]
    pub async fn connect(config: &crate::config::DatabaseConfig) -> StorageResult<Self> {
        let backend = crate::backend::StorageBackendBuilder::from_config(config)
            .build()
            .await?;
        let encrypter = config
            .encryption_key
            .as_deref()
            .map(Encrypter::from_secret)
            .transpose()?;
        tracing::info!(
            engine = backend.backend_type(),
            encrypted = encrypter.is_some(),
            "database connected"
        );
        Ok(Self::new(backend, encrypter))
    }

    /// Store for `namespace` whose records never expire
    pub fn store(&self, namespace: &str) -> Store {
        self.store_with_ttl(namespace, 0)
    }

    /// Store for `namespace` whose records expire `ttl_seconds` after each write
    pub fn store_with_ttl(&self, namespace: &str, ttl_seconds: u64) -> Store {
        let mut store = Store::new(Arc::clone(&self.backend), namespace).with_ttl(ttl_seconds);
        if let Some(encrypter) = &self.encrypter {
            store = store.with_encrypter(encrypter.clone());
        }
        store
    }

    /// The underlying backend
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Release the backend
    pub async fn close(&self) -> StorageResult<()> {
        self.backend.close().await
    }
}

/// Typed view of one namespace
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
    ttl_seconds: u64,
    encrypter: Option<Encrypter>,
}

impl Store {
    /// Create a store for `namespace` without expiry or encryption
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            ttl_seconds: 0,
            encrypter: None,
        }
    }

    /// Expire records `ttl_seconds` after each write (0 disables expiry)
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Seal values with `encrypter`
    pub fn with_encrypter(mut self, encrypter: Encrypter) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    /// Namespace this store is bound to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> StorageResult<Vec<u8>> {
        let json =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        match &self.encrypter {
            Some(encrypter) => encrypter.seal(&json),
            None => Ok(json),
        }
    }

    fn decode<T: DeserializeOwned>(&self, raw: Vec<u8>) -> StorageResult<T> {
        let json = match &self.encrypter {
            Some(encrypter) => encrypter.open(&raw)?,
            None => raw,
        };
        serde_json::from_slice(&json).map_err(|e| {
            debug!(namespace = %self.namespace, error = %e, "stored value failed to decode");
            StorageError::Deserialization(e.to_string())
        })
    }

    /// Read one value
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        self.backend
            .get(&self.namespace, key)
            .await?
            .map(|raw| self.decode(raw))
            .transpose()
    }

    /// List values, newest first
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        page: &PageRequest,
    ) -> StorageResult<Records<T>> {
        self.backend
            .get_all(&self.namespace, page)
            .await?
            .try_map(|raw| self.decode(raw))
    }

    /// List values tagged with `index`, newest first
    pub async fn get_by_index<T: DeserializeOwned>(
        &self,
        index: &Index,
        page: &PageRequest,
    ) -> StorageResult<Records<T>> {
        self.backend
            .get_by_index(&self.namespace, index, page)
            .await?
            .try_map(|raw| self.decode(raw))
    }

    /// Insert or replace a value and its index set
    pub async fn put<T: Serialize + ?Sized + Sync>(
        &self,
        key: &str,
        value: &T,
        indexes: &[Index],
    ) -> StorageResult<()> {
        let raw = self.encode(value)?;
        self.backend
            .put(&self.namespace, key, &raw, self.ttl_seconds, indexes)
            .await
    }

    /// Delete one value; missing keys are not an error
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.backend.delete(&self.namespace, key).await
    }

    /// Delete several values in one batch
    pub async fn delete_many(&self, keys: &[String]) -> StorageResult<u64> {
        self.backend.delete_many(&self.namespace, keys).await
    }
}
