//! Backing key-value store abstraction.
//!
//! The cache layer never owns storage: every entry lives in a shared,
//! TTL-capable key-value store reachable by all process instances. This
//! module pins down the capability contract the layer requires of it:
//! - [`KeyValueStore`]: get / set-with-expiry / delete / pattern ops
//! - [`memory`]: an in-process implementation with native TTL semantics,
//!   used by tests and single-node runs

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out")]
    Timeout,

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregate store-wide counters, as reported by the store's own INFO call.
///
/// Hit/miss counters are global to the store, so every process sharing it
/// observes the same numbers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreInfo {
    pub used_memory_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Capability contract for the shared backing store.
///
/// Patterns use `*` as a segment wildcard (e.g. `reel:trending:*`,
/// `reel:*:user-42:*`); implementations only need prefix/glob matching,
/// enough for invalidate-by-type, invalidate-by-owner, and stats sweeps.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write a value with a per-key TTL. Expiry is enforced by the store;
    /// the cache layer never tracks it.
    async fn set_ex(&self, key: &str, ttl_secs: u64, value: Bytes) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    async fn del_many(&self, keys: &[String]) -> Result<(), StoreError>;

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Remaining TTL in seconds, or `None` for a missing key.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Per-key memory footprint in bytes, or `None` for a missing key.
    async fn memory_usage(&self, key: &str) -> Result<Option<u64>, StoreError>;

    async fn info(&self) -> Result<StoreInfo, StoreError>;
}

/// Match a key against a `*`-wildcard pattern.
///
/// Shared by store implementations; the semantics are the usual glob subset
/// (a `*` matches any run of characters, everything else is literal).
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    fn matches(p: &[u8], k: &[u8]) -> bool {
        match (p.first(), k.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                matches(&p[1..], k) || (!k.is_empty() && matches(p, &k[1..]))
            }
            (Some(pc), Some(kc)) if pc == kc => matches(&p[1..], &k[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), key.as_bytes())
}
