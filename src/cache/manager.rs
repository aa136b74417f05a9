//! Cache manager: the public façade over the store, codec, and policy table.
//!
//! Every operation is best-effort with respect to the cache. A store
//! failure or timeout on read is a miss; on write it is logged and
//! swallowed; a corrupted payload decodes to a miss. The cache is purely an
//! optimization layer and must never fail a request.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::codec::Codec;
use crate::cache::key::{cache_key, owner_pattern, type_pattern, CallerRole, QueryParams, ResourceType};
use crate::cache::policy::PolicyStore;
use crate::config::Config;
use crate::store::KeyValueStore;

/// Stored entry layout: one flag byte (1 = zstd-compressed) ahead of the
/// payload. The flag travels with the entry so any process can decode it.
const FLAG_COMPRESSED: u8 = 1;
const FLAG_RAW: u8 = 0;

pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    policy: Arc<PolicyStore>,
    codec: Codec,
    op_timeout: Duration,
}

impl CacheManager {
    pub fn new(config: Arc<Config>, store: Arc<dyn KeyValueStore>, policy: Arc<PolicyStore>) -> Self {
        let codec = Codec::new(config.codec.clone());
        let op_timeout = Duration::from_millis(config.store.op_timeout_ms);
        Self {
            store,
            policy,
            codec,
            op_timeout,
        }
    }

    /// Deterministic key for (type, params). Pure; exposed so callers and
    /// the warmer can reason about key identity.
    pub fn key_for(&self, resource_type: ResourceType, params: &QueryParams) -> String {
        cache_key(resource_type, params)
    }

    /// Look up a cached value. Returns `None` on miss, store failure,
    /// timeout, or undecodable payload; never an error.
    pub async fn get<T: DeserializeOwned>(
        &self,
        resource_type: ResourceType,
        params: &QueryParams,
    ) -> Option<T> {
        let key = cache_key(resource_type, params);

        let stored = match tokio::time::timeout(self.op_timeout, self.store.get(&key)).await {
            Ok(Ok(stored)) => stored?,
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "Store GET failed, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(key = %key, "Store GET timed out, treating as miss");
                return None;
            }
        };

        let Some((&flag, payload)) = stored.split_first() else {
            warn!(key = %key, "Empty cache entry, treating as miss");
            return None;
        };

        match self.codec.decode(payload, flag == FLAG_COMPRESSED) {
            Ok(value) => Some(value),
            Err(err) => {
                // Corrupted cache data must never break the request path.
                warn!(key = %key, error = %err, "Cache entry failed to decode, treating as miss");
                None
            }
        }
    }

    /// Write a value through the admission gate. A rejected or failed write
    /// is a silent no-op for the caller; the only observable effect of a
    /// successful one is eventual cache hits.
    pub async fn set<T: Serialize>(
        &self,
        resource_type: ResourceType,
        params: &QueryParams,
        value: &T,
        role: CallerRole,
    ) {
        let key = cache_key(resource_type, params);

        let (payload, compressed) = match self.codec.encode(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key = %key, error = %err, "Encode failed, skipping cache write");
                return;
            }
        };

        if !self
            .policy
            .should_cache(resource_type, role, payload.len() as u64)
            .await
        {
            return;
        }

        let ttl_secs = self.policy.ttl_for(resource_type, role).await;

        let mut entry = Vec::with_capacity(payload.len() + 1);
        entry.push(if compressed { FLAG_COMPRESSED } else { FLAG_RAW });
        entry.extend_from_slice(&payload);

        match tokio::time::timeout(
            self.op_timeout,
            self.store.set_ex(&key, ttl_secs, Bytes::from(entry)),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(key = %key, ttl_secs, compressed, bytes = payload.len(), "Cached");
            }
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "Store SETEX failed, skipping cache write");
            }
            Err(_) => {
                warn!(key = %key, "Store SETEX timed out, skipping cache write");
            }
        }
    }

    /// Drop one entry.
    pub async fn invalidate(&self, resource_type: ResourceType, params: &QueryParams) {
        let key = cache_key(resource_type, params);
        if let Err(err) = self.del_bounded(&key).await {
            warn!(key = %key, error = %err, "Invalidate failed");
        }
    }

    /// Drop every entry of one type.
    pub async fn invalidate_type(&self, resource_type: ResourceType) {
        self.invalidate_pattern(&type_pattern(resource_type)).await;
    }

    /// Drop every entry owned by one caller, across all types.
    pub async fn invalidate_owner(&self, owner_id: &str) {
        self.invalidate_pattern(&owner_pattern(owner_id)).await;
    }

    async fn invalidate_pattern(&self, pattern: &str) {
        let keys = match tokio::time::timeout(self.op_timeout, self.store.keys(pattern)).await {
            Ok(Ok(keys)) => keys,
            Ok(Err(err)) => {
                warn!(pattern = %pattern, error = %err, "Pattern enumeration failed");
                return;
            }
            Err(_) => {
                warn!(pattern = %pattern, "Pattern enumeration timed out");
                return;
            }
        };

        if keys.is_empty() {
            return;
        }

        match tokio::time::timeout(self.op_timeout, self.store.del_many(&keys)).await {
            Ok(Ok(())) => {
                debug!(pattern = %pattern, count = keys.len(), "Invalidated");
            }
            Ok(Err(err)) => {
                warn!(pattern = %pattern, error = %err, "Pattern delete failed");
            }
            Err(_) => {
                warn!(pattern = %pattern, "Pattern delete timed out");
            }
        }
    }

    async fn del_bounded(&self, key: &str) -> Result<(), crate::store::StoreError> {
        tokio::time::timeout(self.op_timeout, self.store.del(key))
            .await
            .map_err(|_| crate::store::StoreError::Timeout)?
    }
}
