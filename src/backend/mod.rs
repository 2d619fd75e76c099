//! Storage Backend Abstraction
//!
//! This module provides the namespaced record-store contract and its
//! backends. Callers depend on [`StorageBackend`] only; the concrete engine is
//! chosen at configuration time through [`StorageBackendBuilder`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │        Store        │
//! │ (namespaced, typed) │
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐     ┌─────────────┐
//! │   StorageBackend    │────▶│  Key Codec  │
//! │      (async)        │     └─────────────┘
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴──────┐
//!     │             │
//! ┌───▼────┐   ┌────▼──────┐
//! │ Memory │   │ DocumentDB│
//! │Backend │   │  Backend  │
//! └────────┘   └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fedstore::backend::{Index, MemoryStorageBackend, PageRequest, StorageBackend};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let backend = MemoryStorageBackend::new()?;
//!
//!     backend
//!         .put("saml:config", "abc", b"payload", 0, &[Index::new("entityID", "https://idp")])
//!         .await?;
//!
//!     let value = backend.get("saml:config", "abc").await?;
//!     let page = backend.get_all("saml:config", &PageRequest::new(0, 10)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
mod memory_backend;
mod traits;

pub use memory_backend::*;
pub use traits::*;

#[cfg(feature = "storage-documentdb")]
mod documentdb_backend;

#[cfg(feature = "storage-documentdb")]
pub use documentdb_backend::{DocumentDBStorageBackend, DEFAULT_COLLECTION, DEFAULT_DATABASE};
