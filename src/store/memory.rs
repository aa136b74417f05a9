//! In-process implementation of [`KeyValueStore`] with native per-key TTL.
//!
//! Semantics mirror the shared production store closely enough that the
//! cache layer cannot tell the difference: entries expire lazily on access
//! and during pattern sweeps, and hit/miss counters are store-global.
//!
//! Uses `tokio::time::Instant` for expiry so tests can drive the clock with
//! a paused runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{pattern_matches, KeyValueStore, StoreError, StoreInfo};

struct Entry {
    value: Bytes,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// TTL-capable in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn drop_expired(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| !e.is_expired(now));
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set_ex(&self, key: &str, ttl_secs: u64, value: Bytes) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn del_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.drop_expired().await;
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|k| pattern_matches(pattern, k))
            .cloned()
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|e| {
            if e.is_expired(now) {
                None
            } else {
                Some(e.expires_at.duration_since(now).as_secs())
            }
        }))
    }

    async fn memory_usage(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|e| {
            if e.is_expired(now) {
                None
            } else {
                Some((key.len() + e.value.len()) as u64)
            }
        }))
    }

    async fn info(&self) -> Result<StoreInfo, StoreError> {
        self.drop_expired().await;
        let entries = self.entries.read().await;
        let used: u64 = entries
            .iter()
            .map(|(k, e)| (k.len() + e.value.len()) as u64)
            .sum();
        Ok(StoreInfo {
            used_memory_bytes: used,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}
