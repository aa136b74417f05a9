//! Adaptive policy-driven cache layer.
//!
//! This module contains the core cache components:
//! - [`key`]: deterministic key construction and parameter normalization
//! - [`codec`]: serialization + size-gated zstd compression
//! - [`policy`]: admission control and TTL self-tuning
//! - [`manager`]: the public get/set/invalidate façade
//! - [`warmer`]: proactive hot-key population
//! - [`metrics`]: on-demand operational snapshots

pub mod codec;
pub mod key;
pub mod manager;
pub mod metrics;
pub mod policy;
pub mod warmer;
