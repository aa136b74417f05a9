//! reel-cache: adaptive policy-driven cache layer for role-scoped
//! analytics and dashboard queries.
//!
//! Sits in front of the platform's expensive derived queries and provides:
//! - deterministic cache keys over normalized query parameters
//! - admission control from a per-(type, role) policy table
//! - size-gated zstd payload compression
//! - TTL self-tuning from observed per-type statistics
//! - proactive warming of configured hot keys
//! - on-demand operational metrics
//!
//! The backing TTL-capable key-value store is an external collaborator
//! behind the [`store::KeyValueStore`] trait; the layer is fail-open and
//! degrades to "always miss" when the store is unavailable.

pub mod cache;
pub mod config;
pub mod server;
pub mod store;
