//! DocumentDB/MongoDB Storage Backend
//!
//! Reference implementation of [`StorageBackend`] on a single MongoDB or
//! DocumentDB collection.
//!
//! ## Usage
//!
//! Enable the `storage-documentdb` feature in Cargo.toml:
//!
//! ```toml
//! fedstore = { version = "0.3", features = ["storage-documentdb"] }
//! ```
//!
//! ```rust,no_run
//! use fedstore::backend::DocumentDBStorageBackend;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let backend = DocumentDBStorageBackend::connect(
//!         "mongodb://localhost:27017",
//!         "fedstore",
//!         "records"
//!     ).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Document layout
//!
//! | Field | Content |
//! |-------|---------|
//! | `_id` | encoded identifier (`namespace:key`) |
//! | `value` | opaque payload (binary) |
//! | `indexes` | encoded index tokens |
//! | `createdAt` | set on insert only |
//! | `modifiedAt` | set on every write |
//! | `expiresAt` | absent when the record never expires |
//!
//! A TTL index on `expiresAt` lets the server reap expired documents; reads
//! filter them out until it does.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, spec::BinarySubtype, Binary, Bson, DateTime, Document},
    options::{ClientOptions, FindOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use std::time::Duration;
use tracing::{debug, info};

use super::codec::{
    encode_index_token, encode_key, namespace_prefix, normalize_page, DEFAULT_PAGE_LIMIT,
};
use super::traits::{Index, PageRequest, Records, StorageBackend, StorageError, StorageResult};

/// Database used when none is configured
pub const DEFAULT_DATABASE: &str = "fedstore";

/// Collection used when none is configured
pub const DEFAULT_COLLECTION: &str = "records";

/// DocumentDB/MongoDB storage backend
pub struct DocumentDBStorageBackend {
    client: Client,
    collection: Collection<Document>,
    database_name: String,
    page_limit: u64,
}

impl DocumentDBStorageBackend {
    /// Connect and prepare the collection
    ///
    /// Pings the server and creates the `indexes` lookup index and the
    /// `expiresAt` TTL index. The backend is only returned once all of this
    /// succeeded.
    ///
    /// # Arguments
    /// * `connection_string` - MongoDB/DocumentDB connection string
    /// * `database` - Database name
    /// * `collection` - Collection name
    pub async fn connect(
        connection_string: &str,
        database: &str,
        collection: &str,
    ) -> StorageResult<Self> {
        let client_options = ClientOptions::parse(connection_string)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let client = Client::with_options(client_options)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let db = client.database(database);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let coll = db.collection::<Document>(collection);
        ensure_indexes(&coll).await?;

        info!(database, collection, "documentdb storage backend ready");
        Ok(Self {
            client,
            collection: coll,
            database_name: database.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        })
    }

    /// Override the upper bound applied to requested page sizes
    ///
    /// Zero is rejected: the server would read a zero limit as "no limit".
    pub fn with_page_limit(mut self, page_limit: u64) -> StorageResult<Self> {
        if page_limit == 0 {
            return Err(StorageError::Configuration(
                "page_limit must be greater than zero".into(),
            ));
        }
        self.page_limit = page_limit;
        Ok(self)
    }

    /// Get the collection (for advanced operations)
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }

    async fn find_values(
        &self,
        filter: Document,
        page: &PageRequest,
    ) -> StorageResult<Records<Vec<u8>>> {
        let mut find_options = FindOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .projection(doc! { "value": 1 })
            .build();
        if let Some((offset, limit)) = normalize_page(page.offset, page.limit, self.page_limit) {
            find_options.skip = Some(offset);
            find_options.limit = Some(limit as i64);
        }

        let mut cursor = self
            .collection
            .find(filter)
            .with_options(find_options)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut values = Vec::new();
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            values.push(value_of(&doc)?);
        }

        // Offset/limit pagination only; continuation tokens are never issued
        Ok(Records::new(values))
    }
}

async fn ensure_indexes(collection: &Collection<Document>) -> StorageResult<()> {
    let lookup = IndexModel::builder().keys(doc! { "indexes": 1 }).build();
    let expiry = IndexModel::builder()
        .keys(doc! { "expiresAt": 1 })
        .options(
            IndexOptions::builder()
                .expire_after(Duration::from_secs(0))
                .build(),
        )
        .build();

    for model in [lookup, expiry] {
        let created = collection
            .create_index(model)
            .await
            .map_err(|e| StorageError::Connection(format!("failed to create index: {}", e)))?;
        debug!(index = %created.index_name, "index ensured");
    }
    Ok(())
}

/// Matches documents that have no expiry or whose expiry is still ahead
fn unexpired(now: DateTime) -> Document {
    doc! {
        "$or": [
            { "expiresAt": { "$exists": false } },
            { "expiresAt": { "$gt": now } },
        ]
    }
}

fn value_of(doc: &Document) -> StorageResult<Vec<u8>> {
    match doc.get("value") {
        Some(Bson::Binary(bin)) => Ok(bin.bytes.clone()),
        _ => Err(StorageError::Deserialization(
            "Invalid value format in document".to_string(),
        )),
    }
}

fn is_live(doc: &Document, now: DateTime) -> bool {
    match doc.get_datetime("expiresAt") {
        Ok(expires_at) => *expires_at > now,
        Err(_) => true,
    }
}

#[async_trait]
impl StorageBackend for DocumentDBStorageBackend {
    fn backend_type(&self) -> &'static str {
        "documentdb"
    }

    async fn is_available(&self) -> bool {
        self.client
            .database(&self.database_name)
            .run_command(doc! { "ping": 1 })
            .await
            .is_ok()
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let id = encode_key(namespace, key)?;
        let mut filter = unexpired(DateTime::now());
        filter.insert("_id", id);

        let doc = self
            .collection
            .find_one(filter)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        doc.as_ref().map(value_of).transpose()
    }

    async fn get_all(
        &self,
        namespace: &str,
        page: &PageRequest,
    ) -> StorageResult<Records<Vec<u8>>> {
        let prefix = namespace_prefix(namespace)?;
        let mut filter = unexpired(DateTime::now());
        filter.insert(
            "_id",
            doc! { "$regex": format!("^{}", regex::escape(&prefix)) },
        );
        self.find_values(filter, page).await
    }

    async fn get_by_index(
        &self,
        namespace: &str,
        index: &Index,
        page: &PageRequest,
    ) -> StorageResult<Records<Vec<u8>>> {
        // The token embeds the namespace, so no _id filter is needed
        let token = encode_index_token(namespace, index)?;
        let mut filter = unexpired(DateTime::now());
        filter.insert("indexes", token);
        self.find_values(filter, page).await
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
        indexes: &[Index],
    ) -> StorageResult<()> {
        let id = encode_key(namespace, key)?;
        let tokens = indexes
            .iter()
            .map(|index| encode_index_token(namespace, index))
            .collect::<StorageResult<Vec<_>>>()?;
        let now = DateTime::now();
        let expires_at = match ttl_seconds {
            0 => None,
            secs => {
                let ttl_millis = i64::try_from(secs)
                    .ok()
                    .and_then(|secs| secs.checked_mul(1000))
                    .ok_or_else(|| StorageError::InvalidInput("ttl_seconds is too large".into()))?;
                Some(DateTime::from_millis(
                    now.timestamp_millis().saturating_add(ttl_millis),
                ))
            }
        };

        // An expired document the server has not reaped yet is logically
        // absent; drop it so the upsert below counts as an insert.
        self.collection
            .delete_one(doc! { "_id": id.as_str(), "expiresAt": { "$lte": now } })
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut set = doc! {
            "value": Binary { subtype: BinarySubtype::Generic, bytes: value.to_vec() },
            "indexes": tokens,
            "modifiedAt": now,
        };
        let mut update = doc! { "$setOnInsert": { "createdAt": now } };
        match expires_at {
            Some(at) => {
                set.insert("expiresAt", at);
            }
            None => {
                update.insert("$unset", doc! { "expiresAt": "" });
            }
        }
        update.insert("$set", set);

        self.collection
            .update_one(doc! { "_id": id.as_str() }, update)
            .upsert(true)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(namespace, ttl_seconds, indexes = indexes.len(), "documentdb put");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let id = encode_key(namespace, key)?;
        let removed = self
            .collection
            .find_one_and_delete(doc! { "_id": id })
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(removed.is_some_and(|doc| is_live(&doc, DateTime::now())))
    }

    async fn delete_many(&self, namespace: &str, keys: &[String]) -> StorageResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let ids = keys
            .iter()
            .map(|key| encode_key(namespace, key))
            .collect::<StorageResult<Vec<_>>>()?;

        // Expired documents are left to the TTL index
        let mut filter = unexpired(DateTime::now());
        filter.insert("_id", doc! { "$in": ids });

        let result = self
            .collection
            .delete_many(filter)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(
            namespace,
            requested = keys.len(),
            deleted = result.deleted_count,
            "documentdb delete_many"
        );
        Ok(result.deleted_count)
    }

    async fn close(&self) -> StorageResult<()> {
        self.client.clone().shutdown().await;
        info!("documentdb storage backend closed");
        Ok(())
    }
}
