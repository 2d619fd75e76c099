//! Backend-agnostic conformance checks for `StorageBackend` implementations.
//!
//! Every check takes a ready backend and works in its own namespace, so the
//! same functions can run against a shared remote collection.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fedstore::backend::{Index, PageRequest, StorageBackend, StorageError};

static NAMESPACE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A namespace no other check (or earlier run) has used
pub fn unique_namespace(label: &str) -> String {
    format!(
        "{}:{}-{}",
        label,
        chrono::Utc::now().timestamp_micros(),
        NAMESPACE_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

fn utf8(values: Vec<Vec<u8>>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| String::from_utf8(v).expect("test values are utf-8"))
        .collect()
}

// Distinct createdAt values for engines with millisecond timestamps
async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

// ============================================================================
// CRUD
// ============================================================================

/// `put` then `get` returns the value.
pub async fn put_then_get_round_trips<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("crud");
    backend.put(&ns, "k1", b"v1", 0, &[]).await.expect("put");
    assert_eq!(backend.get(&ns, "k1").await.expect("get"), Some(b"v1".to_vec()));
}

/// `get` on a missing key is `None`, not an error.
pub async fn get_missing_returns_none<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("crud");
    assert_eq!(backend.get(&ns, "ghost").await.expect("get"), None);
}

/// A second `put` replaces the value in place.
pub async fn put_overwrites_value<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("crud");
    backend.put(&ns, "k", b"original", 0, &[]).await.expect("put");
    backend.put(&ns, "k", b"updated", 0, &[]).await.expect("overwrite");

    assert_eq!(backend.get(&ns, "k").await.expect("get"), Some(b"updated".to_vec()));
    let all = backend.get_all(&ns, &PageRequest::all()).await.expect("get_all");
    assert_eq!(utf8(all.data), vec!["updated"]);
}

/// Deleting a missing key is not an error.
pub async fn delete_is_idempotent<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("crud");
    backend.put(&ns, "k", b"v", 0, &[]).await.expect("put");

    assert!(backend.delete(&ns, "k").await.expect("delete"));
    assert_eq!(backend.get(&ns, "k").await.expect("get"), None);
    assert!(!backend.delete(&ns, "k").await.expect("second delete"));
    assert!(!backend.delete(&ns, "never-written").await.expect("delete missing"));
}

/// Empty namespaces and keys are rejected, never silently stored.
pub async fn malformed_input_is_rejected<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("crud");
    assert!(matches!(
        backend.put("", "k", b"v", 0, &[]).await,
        Err(StorageError::InvalidInput(_))
    ));
    assert!(matches!(
        backend.put(&ns, "", b"v", 0, &[]).await,
        Err(StorageError::InvalidInput(_))
    ));
    assert!(matches!(
        backend.put(&ns, "k", b"v", 0, &[Index::new("email", "")]).await,
        Err(StorageError::InvalidInput(_))
    ));
    assert!(matches!(backend.get("", "k").await, Err(StorageError::InvalidInput(_))));
    assert!(matches!(
        backend.get_all("", &PageRequest::all()).await,
        Err(StorageError::InvalidInput(_))
    ));
    assert!(backend.get_all(&ns, &PageRequest::all()).await.expect("get_all").is_empty());
}

// ============================================================================
// Indexes
// ============================================================================

/// A record is found through its index and not through a different value.
pub async fn get_by_index_matches_exact_value<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("ns1");
    let email = Index::new("email", "a@b.com");
    backend.put(&ns, "k1", b"record", 0, &[email.clone()]).await.expect("put");

    let found = backend.get_by_index(&ns, &email, &PageRequest::all()).await.expect("lookup");
    assert_eq!(utf8(found.data), vec!["record"]);

    let missing = backend
        .get_by_index(&ns, &Index::new("email", "x@y.com"), &PageRequest::all())
        .await
        .expect("lookup other");
    assert!(missing.is_empty());
}

/// A write without indexes clears the previous index set.
pub async fn put_without_indexes_clears_indexes<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("idx");
    let idx = Index::new("tenant", "acme");
    backend.put(&ns, "k", b"v1", 0, &[idx.clone()]).await.expect("put indexed");
    backend.put(&ns, "k", b"v2", 0, &[]).await.expect("put plain");

    let found = backend.get_by_index(&ns, &idx, &PageRequest::all()).await.expect("lookup");
    assert!(found.is_empty(), "stale index still matches");
    assert_eq!(backend.get(&ns, "k").await.expect("get"), Some(b"v2".to_vec()));
}

/// A write replaces the index set rather than merging into it.
pub async fn put_replaces_index_set<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("idx");
    let a = Index::new("tenant", "a");
    let b = Index::new("tenant", "b");
    backend.put(&ns, "k", b"v", 0, &[a.clone()]).await.expect("put a");
    backend.put(&ns, "k", b"v", 0, &[b.clone()]).await.expect("put b");

    assert!(backend.get_by_index(&ns, &a, &PageRequest::all()).await.expect("a").is_empty());
    assert_eq!(backend.get_by_index(&ns, &b, &PageRequest::all()).await.expect("b").len(), 1);
}

/// The same index in two namespaces stays separate.
pub async fn get_by_index_is_namespace_scoped<B: StorageBackend + ?Sized>(backend: &B) {
    let ns1 = unique_namespace("idx");
    let ns2 = unique_namespace("idx");
    let idx = Index::new("product", "portal");
    backend.put(&ns1, "k", b"one", 0, &[idx.clone()]).await.expect("put ns1");
    backend.put(&ns2, "k", b"two", 0, &[idx.clone()]).await.expect("put ns2");

    let found = backend.get_by_index(&ns1, &idx, &PageRequest::all()).await.expect("lookup");
    assert_eq!(utf8(found.data), vec!["one"]);
}

// ============================================================================
// Scans and pagination
// ============================================================================

/// `get_all` only returns records of the requested namespace, including
/// when another namespace extends it.
pub async fn get_all_is_namespace_scoped<B: StorageBackend + ?Sized>(backend: &B) {
    let ns1 = unique_namespace("scan");
    let ns2 = unique_namespace("scan");
    let nested = format!("{}:sub", ns1);
    backend.put(&ns1, "k1", b"ns1", 0, &[]).await.expect("put ns1");
    backend.put(&ns2, "k1", b"ns2", 0, &[]).await.expect("put ns2");
    backend.put(&nested, "k1", b"nested", 0, &[]).await.expect("put nested");

    let all = backend.get_all(&ns1, &PageRequest::all()).await.expect("get_all");
    assert_eq!(utf8(all.data), vec!["ns1"]);
}

/// Records come back newest-created first and pages cut that order.
pub async fn get_all_is_newest_first_and_paginates<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("page");
    for key in ["a", "b", "c"] {
        backend.put(&ns, key, key.to_uppercase().as_bytes(), 0, &[]).await.expect("put");
        tick().await;
    }

    let all = backend.get_all(&ns, &PageRequest::all()).await.expect("all");
    assert_eq!(utf8(all.data), vec!["C", "B", "A"]);

    let second = backend.get_all(&ns, &PageRequest::new(1, 1)).await.expect("page");
    assert_eq!(utf8(second.data), vec!["B"]);
    assert!(second.page_token.is_none());

    let tail = backend.get_all(&ns, &PageRequest::new(2, 10)).await.expect("tail");
    assert_eq!(utf8(tail.data), vec!["A"]);

    let past_end = backend.get_all(&ns, &PageRequest::new(5, 10)).await.expect("past end");
    assert!(past_end.is_empty());

    // Offset without limit is not pagination
    let unpaged = PageRequest {
        offset: Some(2),
        ..Default::default()
    };
    assert_eq!(backend.get_all(&ns, &unpaged).await.expect("unpaged").len(), 3);
}

/// Updating a record keeps its original position in newest-first order.
pub async fn update_keeps_creation_order<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("order");
    backend.put(&ns, "a", b"A", 0, &[]).await.expect("put a");
    tick().await;
    backend.put(&ns, "b", b"B", 0, &[]).await.expect("put b");
    tick().await;
    backend.put(&ns, "a", b"A2", 0, &[]).await.expect("update a");

    let all = backend.get_all(&ns, &PageRequest::all()).await.expect("get_all");
    assert_eq!(utf8(all.data), vec!["B", "A2"]);
}

/// Index lookups share the ordering and pagination of `get_all`.
pub async fn get_by_index_paginates<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("page");
    let idx = Index::new("tenant", "acme");
    for key in ["a", "b", "c"] {
        backend.put(&ns, key, key.as_bytes(), 0, &[idx.clone()]).await.expect("put");
        tick().await;
    }
    backend.put(&ns, "z", b"z", 0, &[]).await.expect("put unindexed");

    let page = backend.get_by_index(&ns, &idx, &PageRequest::new(0, 2)).await.expect("page");
    assert_eq!(utf8(page.data), vec!["c", "b"]);
}

// ============================================================================
// Batch delete
// ============================================================================

/// An empty batch changes nothing.
pub async fn delete_many_empty_is_noop<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("batch");
    backend.put(&ns, "k", b"v", 0, &[]).await.expect("put");
    assert_eq!(backend.delete_many(&ns, &[]).await.expect("delete_many"), 0);
    assert_eq!(backend.get(&ns, "k").await.expect("get"), Some(b"v".to_vec()));
}

/// Every key of a batch is gone afterwards; missing keys are skipped.
pub async fn delete_many_removes_every_key<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("batch");
    for key in ["k1", "k2", "k3"] {
        backend.put(&ns, key, b"v", 0, &[]).await.expect("put");
    }

    let keys = vec!["k1".to_string(), "k2".to_string(), "missing".to_string()];
    assert_eq!(backend.delete_many(&ns, &keys).await.expect("delete_many"), 2);
    assert_eq!(backend.get(&ns, "k1").await.expect("get k1"), None);
    assert_eq!(backend.get(&ns, "k2").await.expect("get k2"), None);
    assert_eq!(backend.get(&ns, "k3").await.expect("get k3"), Some(b"v".to_vec()));
}

// ============================================================================
// TTL
// ============================================================================

/// An expired record disappears from every read path.
pub async fn expired_record_is_unreachable<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("ttl");
    let idx = Index::new("session", "s1");
    backend.put(&ns, "k", b"v", 1, &[idx.clone()]).await.expect("put");
    backend.put(&ns, "keep", b"keep", 0, &[idx.clone()]).await.expect("put keep");
    assert!(backend.get(&ns, "k").await.expect("get").is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(backend.get(&ns, "k").await.expect("get"), None);
    let all = backend.get_all(&ns, &PageRequest::all()).await.expect("get_all");
    assert_eq!(utf8(all.data), vec!["keep"]);
    let indexed = backend.get_by_index(&ns, &idx, &PageRequest::all()).await.expect("lookup");
    assert_eq!(utf8(indexed.data), vec!["keep"]);
}

/// A write with `ttl_seconds == 0` removes an earlier expiry.
pub async fn zero_ttl_clears_expiry<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("ttl");
    backend.put(&ns, "k", b"short", 1, &[]).await.expect("put ttl");
    backend.put(&ns, "k", b"forever", 0, &[]).await.expect("put no ttl");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(backend.get(&ns, "k").await.expect("get"), Some(b"forever".to_vec()));
}

/// Writing over an expired record starts a fresh record.
pub async fn put_after_expiry_recreates_record<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("ttl");
    backend.put(&ns, "old", b"old", 1, &[]).await.expect("put old");
    tick().await;
    backend.put(&ns, "other", b"other", 0, &[]).await.expect("put other");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    backend.put(&ns, "old", b"reborn", 0, &[]).await.expect("put again");

    // Recreated after "other", so it sorts first
    let all = backend.get_all(&ns, &PageRequest::all()).await.expect("get_all");
    assert_eq!(utf8(all.data), vec!["reborn", "other"]);
}

/// A TTL past the engine's clock range fails cleanly and leaves the record alone.
pub async fn oversized_ttl_is_rejected<B: StorageBackend + ?Sized>(backend: &B) {
    let ns = unique_namespace("ttl");
    backend.put(&ns, "k", b"v", 0, &[]).await.expect("put");

    let result = backend.put(&ns, "k", b"v2", u64::MAX, &[]).await;
    assert!(matches!(result, Err(StorageError::InvalidInput(_))));
    assert_eq!(backend.get(&ns, "k").await.expect("get"), Some(b"v".to_vec()));
}
