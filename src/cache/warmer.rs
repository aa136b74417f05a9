//! Cache warming: keeps a fixed set of hot keys populated ahead of demand.
//!
//! On each tick the warmer checks every configured hot (type, params)
//! target; absent entries are refetched through the registered per-type
//! data-source callback and written back through the cache manager. This is
//! fire-and-forget background work racing benignly with organic population:
//! whichever writer lands last wins, and both writes carry the same data.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::key::{QueryParams, ResourceType};
use crate::cache::manager::CacheManager;
use crate::config::Config;

/// Data-source callback: computes the value for (params) from the source of
/// truth. Supplied per resource type by the collaborator subsystem that
/// owns the underlying query.
pub type Fetcher =
    Arc<dyn Fn(QueryParams) -> BoxFuture<'static, anyhow::Result<serde_json::Value>> + Send + Sync>;

pub struct Warmer {
    manager: Arc<CacheManager>,
    config: Arc<Config>,
    fetchers: HashMap<ResourceType, Fetcher>,
}

impl Warmer {
    pub fn new(manager: Arc<CacheManager>, config: Arc<Config>) -> Self {
        Self {
            manager,
            config,
            fetchers: HashMap::new(),
        }
    }

    /// Register the data-source callback for a type. Targets of types with
    /// no registered fetcher are skipped.
    pub fn register_fetcher(&mut self, resource_type: ResourceType, fetcher: Fetcher) {
        self.fetchers.insert(resource_type, fetcher);
    }

    /// One warming sweep over all configured hot targets. Failures are
    /// logged and never block the remaining targets.
    pub async fn warm_once(&self) {
        for target in &self.config.warmer.targets {
            let Some(fetcher) = self.fetchers.get(&target.resource_type) else {
                debug!(resource_type = %target.resource_type, "No fetcher registered, skipping target");
                continue;
            };

            // Existence probe through the normal read path; a present entry
            // needs no refresh.
            let existing: Option<serde_json::Value> = self
                .manager
                .get(target.resource_type, &target.params)
                .await;
            if existing.is_some() {
                continue;
            }

            match fetcher(target.params.clone()).await {
                Ok(value) => {
                    self.manager
                        .set(
                            target.resource_type,
                            &target.params,
                            &value,
                            self.config.warmer.warm_role,
                        )
                        .await;
                    debug!(
                        resource_type = %target.resource_type,
                        owner = %target.params.owner_id,
                        "Warmed hot key"
                    );
                }
                Err(err) => {
                    warn!(
                        resource_type = %target.resource_type,
                        owner = %target.params.owner_id,
                        error = %err,
                        "Warm fetch failed"
                    );
                }
            }
        }
    }

    /// Run the warming loop until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.warmer.interval_secs);
        info!(
            interval_secs = self.config.warmer.interval_secs,
            targets = self.config.warmer.targets.len(),
            "Warmer started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.warm_once().await;
                }
                _ = shutdown.changed() => {
                    info!("Warmer stopped");
                    return;
                }
            }
        }
    }
}
