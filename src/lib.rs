//! fedstore - Namespaced key-value storage for identity-federation records
//!
//! fedstore persists configuration records (SSO connections, session
//! traces and the like) behind one storage contract, so the engine holding
//! them can be swapped without touching callers:
//!
//! - **`backend`** - The [`StorageBackend`](backend::StorageBackend) contract,
//!   the key codec and the bundled backends
//! - **`store`** - Namespaced, typed stores with optional encryption at rest
//! - **`config`** - Configuration and environment loading
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! fedstore = "0.3"
//! # With the MongoDB/DocumentDB backend:
//! fedstore = { version = "0.3", features = ["storage-documentdb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use fedstore::config::{ConfigurationLoader, EnvironmentLoader};
//! use fedstore::prelude::*;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let mut loader = ConfigurationLoader::new(None)?;
//!     loader.apply_env_overrides(&EnvironmentLoader::default())?;
//!
//!     let db = Database::connect(loader.database()).await?;
//!     let connections = db.store("saml:config");
//!     connections
//!         .put("abc", &serde_json::json!({ "tenant": "acme" }), &[Index::new("tenant", "acme")])
//!         .await?;
//!
//!     let page: Records<serde_json::Value> = connections
//!         .get_by_index(&Index::new("tenant", "acme"), &PageRequest::new(0, 10))
//!         .await?;
//!     db.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Storage contract, key codec and backends
pub mod backend;

/// Namespaced typed stores
pub mod store;

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{
        Index, MemoryStorageBackend, PageRequest, Records, StorageBackend, StorageBackendBuilder,
        StorageError, StorageResult,
    };

    #[cfg(feature = "storage-documentdb")]
    pub use crate::backend::DocumentDBStorageBackend;

    pub use crate::store::{Database, Encrypter, Store};

    #[cfg(feature = "config")]
    pub use crate::config::{ConfigurationLoader, DatabaseConfig, EnvironmentLoader};
}
