//! Key Codec
//!
//! Pure functions mapping logical `(namespace, key)` pairs and index
//! descriptors onto the physical identifiers and index tokens stored by the
//! backends.
//!
//! Every component is percent-encoded before being joined with
//! [`SEPARATOR`], so the separator never occurs inside an encoded component.
//! That keeps the mapping injective and makes a namespace prefix scan match
//! exactly one namespace: records of `"saml"` never show up under a scan of
//! `"saml:config"` and vice versa.
//!
//! Empty namespaces, keys, index names and index values are rejected with
//! [`StorageError::InvalidInput`].

use super::traits::{Index, StorageError, StorageResult};

/// Separator between encoded components
pub const SEPARATOR: char = ':';

/// Page size used when a caller asks for a page without a usable limit
pub const DEFAULT_PAGE_LIMIT: u64 = 50;

fn encode_component(kind: &str, raw: &str) -> StorageResult<String> {
    if raw.is_empty() {
        return Err(StorageError::InvalidInput(format!(
            "{} must not be empty",
            kind
        )));
    }
    Ok(urlencoding::encode(raw).into_owned())
}

/// Derive the physical identifier for `(namespace, key)`
pub fn encode_key(namespace: &str, key: &str) -> StorageResult<String> {
    Ok(format!(
        "{}{}{}",
        encode_component("namespace", namespace)?,
        SEPARATOR,
        encode_component("key", key)?
    ))
}

/// Derive the physical index token for `(namespace, index)`
pub fn encode_index_token(namespace: &str, index: &Index) -> StorageResult<String> {
    Ok(format!(
        "{ns}{sep}{name}{sep}{value}",
        ns = encode_component("namespace", namespace)?,
        name = encode_component("index name", &index.name)?,
        value = encode_component("index value", &index.value)?,
        sep = SEPARATOR,
    ))
}

/// Identifier prefix shared by every record of `namespace`
pub fn namespace_prefix(namespace: &str) -> StorageResult<String> {
    Ok(format!(
        "{}{}",
        encode_component("namespace", namespace)?,
        SEPARATOR
    ))
}

/// Whether a pagination argument was supplied
pub fn is_valid_page_argument(arg: Option<u64>) -> bool {
    arg.is_some()
}

/// Resolve offset/limit into an effective `(offset, limit)` window.
///
/// Returns `None` (unbounded) unless both arguments are supplied. A zero
/// limit, or one above `max_limit`, is clamped to `max_limit`.
pub fn normalize_page(
    offset: Option<u64>,
    limit: Option<u64>,
    max_limit: u64,
) -> Option<(u64, u64)> {
    if !is_valid_page_argument(offset) || !is_valid_page_argument(limit) {
        return None;
    }
    let offset = offset.unwrap_or(0);
    let limit = match limit {
        Some(0) | None => max_limit,
        Some(l) if l > max_limit => max_limit,
        Some(l) => l,
    };
    Some((offset, limit))
}
