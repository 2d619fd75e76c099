//! In-Memory Storage Backend
//!
//! Process-local implementation of [`StorageBackend`], used for development,
//! tests and single-node deployments that can afford to lose their data on
//! restart.
//!
//! Records live in a [`BTreeMap`] keyed by encoded identifier, so a namespace
//! scan is a range scan over the namespace prefix. Expiry is enforced on
//! every read; a background sweep additionally reclaims expired records so
//! they do not accumulate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use super::codec::{
    encode_index_token, encode_key, namespace_prefix, normalize_page, DEFAULT_PAGE_LIMIT,
};
use super::traits::{Index, PageRequest, Records, StorageBackend, StorageError, StorageResult};

/// Tuning for [`MemoryStorageBackend`]
#[derive(Debug, Clone)]
pub struct MemoryOptions {
    /// Upper bound applied to requested page sizes
    pub page_limit: u64,
    /// How often the sweep looks for expired records
    pub sweep_interval: Duration,
    /// Maximum number of records reclaimed per sweep
    pub cleanup_limit: usize,
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            sweep_interval: Duration::from_secs(60),
            cleanup_limit: 1000,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryRecord {
    value: Vec<u8>,
    indexes: HashSet<String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    expires_at: Option<Instant>,
    // Insertion order; breaks created_at ties
    seq: u64,
}

impl MemoryRecord {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Holds the shutdown signal sender. Dropping the last clone of the backend
/// drops this guard, which stops the sweep task.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<bool>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// In-memory storage backend
///
/// Cheap to clone; all clones share the same records.
#[derive(Clone)]
pub struct MemoryStorageBackend {
    records: Arc<RwLock<BTreeMap<String, MemoryRecord>>>,
    next_seq: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
    options: MemoryOptions,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl MemoryStorageBackend {
    /// Create a backend with default options
    ///
    /// Must be called from within a tokio runtime, which hosts the sweep.
    pub fn new() -> StorageResult<Self> {
        Self::with_options(MemoryOptions::default())
    }

    /// Create a backend with explicit options
    pub fn with_options(options: MemoryOptions) -> StorageResult<Self> {
        if options.page_limit == 0 {
            return Err(StorageError::Configuration(
                "page_limit must be greater than zero".into(),
            ));
        }
        if options.sweep_interval.is_zero() {
            return Err(StorageError::Configuration(
                "cleanup interval must be greater than zero".into(),
            ));
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            StorageError::Configuration("memory backend requires a tokio runtime".into())
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let backend = Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            next_seq: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            options,
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        };

        // The task only holds the record map, so it never keeps the guard alive
        let records = Arc::clone(&backend.records);
        let interval = backend.options.sweep_interval;
        let limit = backend.options.cleanup_limit;
        handle.spawn(sweep_expired(records, interval, limit, shutdown_rx));

        info!(
            sweep_interval_secs = interval.as_secs(),
            cleanup_limit = limit,
            "memory storage backend ready"
        );
        Ok(backend)
    }

    /// `(createdAt, modifiedAt)` of a live record
    pub fn record_timestamps(
        &self,
        namespace: &str,
        key: &str,
    ) -> StorageResult<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let id = encode_key(namespace, key)?;
        let now = Instant::now();
        Ok(self
            .records
            .read()
            .get(&id)
            .filter(|record| !record.is_expired(now))
            .map(|record| (record.created_at, record.modified_at)))
    }

    /// Number of records physically held, expired or not
    pub fn stored_records(&self) -> usize {
        self.records.read().len()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Connection("backend closed".into()));
        }
        Ok(())
    }

    fn collect_page(
        &self,
        prefix: &str,
        token: Option<&str>,
        page: &PageRequest,
    ) -> Records<Vec<u8>> {
        let now = Instant::now();
        let records = self.records.read();
        let mut matches: Vec<&MemoryRecord> = records
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(id, _)| id.starts_with(prefix))
            .map(|(_, record)| record)
            .filter(|record| !record.is_expired(now))
            .filter(|record| token.map_or(true, |t| record.indexes.contains(t)))
            .collect();

        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        let values = matches.into_iter().map(|record| record.value.clone());
        let data = match normalize_page(page.offset, page.limit, self.options.page_limit) {
            Some((offset, limit)) => values.skip(offset as usize).take(limit as usize).collect(),
            None => values.collect(),
        };
        Records::new(data)
    }
}

async fn sweep_expired(
    records: Arc<RwLock<BTreeMap<String, MemoryRecord>>>,
    interval: Duration,
    limit: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("memory sweep stopped");
                    return;
                }
            }
        }

        let now = Instant::now();
        let expired: Vec<String> = {
            let guard = records.read();
            guard
                .iter()
                .filter(|(_, record)| record.is_expired(now))
                .map(|(id, _)| id.clone())
                .take(limit)
                .collect()
        };
        if expired.is_empty() {
            continue;
        }

        let mut guard = records.write();
        let mut reclaimed = 0usize;
        for id in &expired {
            // A put may have refreshed the record since the scan
            if guard.get(id).is_some_and(|record| record.is_expired(now)) {
                guard.remove(id);
                reclaimed += 1;
            }
        }
        debug!(reclaimed, "memory sweep reclaimed expired records");
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn is_available(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let id = encode_key(namespace, key)?;
        let now = Instant::now();
        let records = self.records.read();
        Ok(records
            .get(&id)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.value.clone()))
    }

    async fn get_all(
        &self,
        namespace: &str,
        page: &PageRequest,
    ) -> StorageResult<Records<Vec<u8>>> {
        self.ensure_open()?;
        let prefix = namespace_prefix(namespace)?;
        Ok(self.collect_page(&prefix, None, page))
    }

    async fn get_by_index(
        &self,
        namespace: &str,
        index: &Index,
        page: &PageRequest,
    ) -> StorageResult<Records<Vec<u8>>> {
        self.ensure_open()?;
        let prefix = namespace_prefix(namespace)?;
        let token = encode_index_token(namespace, index)?;
        Ok(self.collect_page(&prefix, Some(&token), page))
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl_seconds: u64,
        indexes: &[Index],
    ) -> StorageResult<()> {
        self.ensure_open()?;
        let id = encode_key(namespace, key)?;
        let tokens = indexes
            .iter()
            .map(|index| encode_index_token(namespace, index))
            .collect::<StorageResult<HashSet<_>>>()?;
        let instant = Instant::now();
        let expires_at = match ttl_seconds {
            0 => None,
            secs => Some(
                instant
                    .checked_add(Duration::from_secs(secs))
                    .ok_or_else(|| StorageError::InvalidInput("ttl_seconds is too large".into()))?,
            ),
        };
        let now = Utc::now();

        let mut records = self.records.write();
        match records.get_mut(&id) {
            // An expired record is logically absent, so writing it is an insert
            Some(record) if !record.is_expired(instant) => {
                record.value = value.to_vec();
                record.indexes = tokens;
                record.modified_at = now;
                record.expires_at = expires_at;
            }
            _ => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                records.insert(
                    id,
                    MemoryRecord {
                        value: value.to_vec(),
                        indexes: tokens,
                        created_at: now,
                        modified_at: now,
                        expires_at,
                        seq,
                    },
                );
            }
        }
        debug!(namespace, ttl_seconds, indexes = indexes.len(), "memory put");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.ensure_open()?;
        let id = encode_key(namespace, key)?;
        let removed = self.records.write().remove(&id);
        Ok(removed.is_some_and(|record| !record.is_expired(Instant::now())))
    }

    async fn delete_many(&self, namespace: &str, keys: &[String]) -> StorageResult<u64> {
        self.ensure_open()?;
        if keys.is_empty() {
            return Ok(0);
        }
        // Encode everything first so malformed input leaves the map untouched
        let ids = keys
            .iter()
            .map(|key| encode_key(namespace, key))
            .collect::<StorageResult<Vec<_>>>()?;

        let now = Instant::now();
        let mut records = self.records.write();
        let deleted = ids
            .iter()
            .filter_map(|id| records.remove(id))
            .filter(|record| !record.is_expired(now))
            .count() as u64;
        debug!(namespace, requested = keys.len(), deleted, "memory delete_many");
        Ok(deleted)
    }

    async fn close(&self) -> StorageResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.shutdown_guard.shutdown_tx.send(true);
            info!("memory storage backend closed");
        }
        Ok(())
    }
}
