//! Cache policy table: admission control and TTL self-tuning.
//!
//! Policies are keyed by (resource type, caller role) with a two-level
//! fallback: an explicit (type, role) entry, then the type-wide default,
//! then a hard-coded minimal policy. The table is process-local state owned
//! by the dependency-injection root; each process tunes its own copy, which
//! is acceptable because policies are heuristics, not correctness-critical
//! state.
//!
//! Self-tuning is monotone and bounded: TTL only shrinks toward a floor,
//! max size only grows, so repeated passes converge instead of oscillating.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::key::{type_pattern, CallerRole, ResourceType};
use crate::config::Config;
use crate::store::{KeyValueStore, StoreError};

/// Ordered priority classes used to size per-class memory budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Highest,
}

/// Effective caching policy for one (type, role) resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Entry TTL in seconds (≥ 1).
    pub ttl_secs: u64,

    /// Largest admissible payload in bytes (≥ 1).
    pub max_size_bytes: u64,

    pub priority: Priority,
}

/// Applied when neither a (type, role) entry nor a type default exists.
/// Absence of configuration must never fail a request.
const MINIMAL_POLICY: CachePolicy = CachePolicy {
    ttl_secs: 300,
    max_size_bytes: 100_000,
    priority: Priority::Low,
};

/// Partial policy update; unspecified fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyDelta {
    pub ttl_secs: Option<u64>,
    pub max_size_bytes: Option<u64>,
    pub priority: Option<Priority>,
}

/// Observed per-type statistics gathered from the backing store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeStats {
    pub key_count: usize,
    pub total_bytes: u64,
    pub avg_observed_ttl_secs: f64,
}

/// One row of the policy table, for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyView {
    pub resource_type: ResourceType,
    pub role: Option<CallerRole>,
    #[serde(flatten)]
    pub policy: CachePolicy,
}

/// The policy table plus the store handle its admission gate consults.
pub struct PolicyStore {
    table: RwLock<HashMap<(ResourceType, Option<CallerRole>), CachePolicy>>,
    store: Arc<dyn KeyValueStore>,
    config: Arc<Config>,
    op_timeout: Duration,
}

/// Built-in type-wide defaults, domain-tuned: rankings churn fast,
/// per-video stats are stable.
fn builtin_default(resource_type: ResourceType) -> CachePolicy {
    match resource_type {
        ResourceType::Dashboard => CachePolicy {
            ttl_secs: 300,
            max_size_bytes: 200_000,
            priority: Priority::High,
        },
        ResourceType::Trending => CachePolicy {
            ttl_secs: 600,
            max_size_bytes: 50_000,
            priority: Priority::Medium,
        },
        ResourceType::Analytics => CachePolicy {
            ttl_secs: 900,
            max_size_bytes: 500_000,
            priority: Priority::Medium,
        },
        ResourceType::VideoStats => CachePolicy {
            ttl_secs: 1800,
            max_size_bytes: 100_000,
            priority: Priority::Low,
        },
        ResourceType::EngagementReport => CachePolicy {
            ttl_secs: 900,
            max_size_bytes: 300_000,
            priority: Priority::Medium,
        },
    }
}

impl PolicyStore {
    /// Build the table from built-in defaults, then apply configured seeds.
    pub fn new(config: Arc<Config>, store: Arc<dyn KeyValueStore>) -> Self {
        let mut table = HashMap::new();
        for resource_type in ResourceType::ALL {
            table.insert((resource_type, None), builtin_default(resource_type));
        }

        for seed in &config.policy.seeds {
            let entry = table
                .entry((seed.resource_type, seed.role))
                .or_insert_with(|| builtin_default(seed.resource_type));
            if let Some(ttl) = seed.ttl_secs {
                entry.ttl_secs = ttl.max(1);
            }
            if let Some(size) = seed.max_size_bytes {
                entry.max_size_bytes = size.max(1);
            }
            if let Some(priority) = seed.priority {
                entry.priority = priority;
            }
        }

        let op_timeout = Duration::from_millis(config.store.op_timeout_ms);
        Self {
            table: RwLock::new(table),
            store,
            config,
            op_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Resolve the effective policy: (type, role) entry, then the type-wide
    /// default, then the hard-coded minimal policy.
    pub async fn resolve(&self, resource_type: ResourceType, role: CallerRole) -> CachePolicy {
        let table = self.table.read().await;
        table
            .get(&(resource_type, Some(role)))
            .or_else(|| table.get(&(resource_type, None)))
            .cloned()
            .unwrap_or(MINIMAL_POLICY)
    }

    /// Memory budget for a priority class. `Highest` gets a fixed bonus
    /// over `High`.
    pub fn budget_for(&self, priority: Priority) -> u64 {
        let p = &self.config.policy;
        match priority {
            Priority::Low => p.budget_low_bytes,
            Priority::Medium => p.budget_medium_bytes,
            Priority::High => p.budget_high_bytes,
            Priority::Highest => (p.budget_high_bytes as f64 * p.highest_bonus_factor) as u64,
        }
    }

    /// Admission gate. Rejects payloads over the policy's size ceiling, and
    /// rejects while the store's aggregate used memory exceeds the priority
    /// class's budget. The memory check is global across types, matching
    /// the observed production behavior.
    ///
    /// Rejection is normal control flow under load, not an error. If the
    /// store cannot report memory usage the gate admits; the write itself
    /// will fail-open further down if the store is truly gone.
    pub async fn should_cache(
        &self,
        resource_type: ResourceType,
        role: CallerRole,
        payload_size_bytes: u64,
    ) -> bool {
        let policy = self.resolve(resource_type, role).await;

        if payload_size_bytes > policy.max_size_bytes {
            debug!(
                %resource_type,
                %role,
                payload_size_bytes,
                max = policy.max_size_bytes,
                "Admission rejected: payload over size ceiling"
            );
            return false;
        }

        match self.bounded(self.store.info()).await {
            Ok(store_info) => {
                let budget = self.budget_for(policy.priority);
                if store_info.used_memory_bytes > budget {
                    debug!(
                        %resource_type,
                        used = store_info.used_memory_bytes,
                        budget,
                        "Admission rejected: memory budget exceeded"
                    );
                    return false;
                }
                true
            }
            Err(err) => {
                warn!(%resource_type, error = %err, "Store INFO failed during admission, admitting");
                true
            }
        }
    }

    /// Effective TTL for (type, role).
    pub async fn ttl_for(&self, resource_type: ResourceType, role: CallerRole) -> u64 {
        self.resolve(resource_type, role).await.ttl_secs
    }

    /// Merge a partial update into the (type, role) policy, creating it from
    /// the type default when absent. `role = None` updates the type-wide
    /// default itself.
    pub async fn update_policy(
        &self,
        resource_type: ResourceType,
        role: Option<CallerRole>,
        delta: PolicyDelta,
    ) {
        let mut table = self.table.write().await;
        let entry = table
            .entry((resource_type, role))
            .or_insert_with(|| builtin_default(resource_type));
        if let Some(ttl) = delta.ttl_secs {
            entry.ttl_secs = ttl.max(1);
        }
        if let Some(size) = delta.max_size_bytes {
            entry.max_size_bytes = size.max(1);
        }
        if let Some(priority) = delta.priority {
            entry.priority = priority;
        }
        info!(%resource_type, ?role, policy = ?entry, "Policy updated");
    }

    /// Snapshot of every policy row, for the operator surface.
    pub async fn policies(&self) -> Vec<PolicyView> {
        let table = self.table.read().await;
        let mut rows: Vec<PolicyView> = table
            .iter()
            .map(|(&(resource_type, role), policy)| PolicyView {
                resource_type,
                role,
                policy: policy.clone(),
            })
            .collect();
        rows.sort_by_key(|r| (r.resource_type.as_str(), r.role.map(|r| r.to_string())));
        rows
    }

    /// Gather observed stats for one type by sweeping its key namespace.
    pub async fn stats_for(&self, resource_type: ResourceType) -> Result<TypeStats, StoreError> {
        let keys = self.bounded(self.store.keys(&type_pattern(resource_type))).await?;
        let mut total_bytes = 0u64;
        let mut ttl_sum = 0u64;
        let mut ttl_samples = 0usize;

        for key in &keys {
            if let Some(bytes) = self.bounded(self.store.memory_usage(key)).await? {
                total_bytes += bytes;
            }
            if let Some(remaining) = self.bounded(self.store.ttl(key)).await? {
                ttl_sum += remaining;
                ttl_samples += 1;
            }
        }

        let avg_observed_ttl_secs = if ttl_samples > 0 {
            ttl_sum as f64 / ttl_samples as f64
        } else {
            0.0
        };

        Ok(TypeStats {
            key_count: keys.len(),
            total_bytes,
            avg_observed_ttl_secs,
        })
    }

    /// One self-tuning pass for a type, driven by observed stats.
    ///
    /// Entries dying well before their configured TTL mean the store is
    /// evicting them under pressure, so the configured TTL shrinks toward
    /// the floor. Entries crowding the size ceiling grow it. Both moves are
    /// one-directional, so repeated passes converge.
    pub async fn optimize(&self, resource_type: ResourceType) {
        let stats = match self.stats_for(resource_type).await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(%resource_type, error = %err, "Stats sweep failed, skipping optimization");
                return;
            }
        };

        if stats.key_count == 0 {
            return;
        }

        let mut table = self.table.write().await;
        let entry = table
            .entry((resource_type, None))
            .or_insert_with(|| builtin_default(resource_type));

        let p = &self.config.policy;

        if stats.avg_observed_ttl_secs < 0.5 * entry.ttl_secs as f64 {
            let shrunk = (entry.ttl_secs as f64 * p.ttl_shrink_factor) as u64;
            let new_ttl = shrunk.max(p.ttl_floor_secs);
            if new_ttl < entry.ttl_secs {
                info!(
                    %resource_type,
                    from = entry.ttl_secs,
                    to = new_ttl,
                    observed = stats.avg_observed_ttl_secs,
                    "Policy TTL reduced after early evictions"
                );
                entry.ttl_secs = new_ttl;
            }
        }

        let avg_entry_bytes = stats.total_bytes as f64 / stats.key_count as f64;
        if avg_entry_bytes > 0.8 * entry.max_size_bytes as f64 {
            let grown = (entry.max_size_bytes as f64 * p.max_size_growth_factor) as u64;
            info!(
                %resource_type,
                from = entry.max_size_bytes,
                to = grown,
                avg_entry_bytes,
                "Policy max size grown: entries near ceiling"
            );
            entry.max_size_bytes = grown;
        }
    }

    /// One optimization pass over every known type.
    pub async fn optimize_all(&self) {
        for resource_type in ResourceType::ALL {
            self.optimize(resource_type).await;
        }
    }
}
