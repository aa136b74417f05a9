//! reel-cache binary: wires the cache layer together and runs the
//! background loops plus the operator HTTP surface.
//!
//! Single-node runs use the in-process TTL store; a production deployment
//! swaps in a client for the shared store behind the same trait.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use reel_cache::cache::manager::CacheManager;
use reel_cache::cache::metrics::MetricsCollector;
use reel_cache::cache::policy::PolicyStore;
use reel_cache::cache::warmer::Warmer;
use reel_cache::config::{Cli, Config};
use reel_cache::server::{build_router, AppState};
use reel_cache::store::memory::MemoryStore;
use reel_cache::store::KeyValueStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "reel_cache=debug,tower_http=debug"
    } else {
        "reel_cache=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("reel-cache v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?;
    let config = Arc::new(config);

    info!(
        ttl_floor_secs = config.policy.ttl_floor_secs,
        compression_threshold = config.codec.compression_threshold_bytes,
        warm_targets = config.warmer.targets.len(),
        op_timeout_ms = config.store.op_timeout_ms,
        "Configuration loaded"
    );

    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let policy = Arc::new(PolicyStore::new(config.clone(), store.clone()));
    let manager = Arc::new(CacheManager::new(config.clone(), store.clone(), policy.clone()));
    let metrics = Arc::new(MetricsCollector::new(config.clone(), store.clone()));

    // Background loops stop when the shutdown signal flips.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let warmer = Warmer::new(manager.clone(), config.clone());
    // Data-source fetchers are registered by the embedding application;
    // the standalone binary warms nothing until they exist.
    tokio::spawn(warmer.run(shutdown_rx.clone()));

    {
        let policy = policy.clone();
        let config = config.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
                config.optimizer.interval_secs,
            ));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => policy.optimize_all().await,
                    _ = shutdown.changed() => {
                        info!("Optimizer stopped");
                        return;
                    }
                }
            }
        });
    }

    let state = Arc::new(AppState {
        manager,
        policy,
        metrics,
        start_time: Instant::now(),
    });
    let app = build_router(state);

    let listen_addr = cli.listen;
    info!(addr = listen_addr, "Starting operator server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let _ = shutdown_tx.send(true);
    info!("Shutdown complete");
    Ok(())
}
