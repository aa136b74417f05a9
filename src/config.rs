//! Runtime configuration for reel-cache.
//!
//! Configuration can be loaded from a JSON file or constructed
//! programmatically. All policy knobs (TTL floor, growth factors, memory
//! budgets) and background-loop intervals live here.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::cache::key::{CallerRole, QueryParams, ResourceType};
use crate::cache::policy::Priority;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "reel-cache", about = "Adaptive cache layer for role-scoped analytics queries")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address for the operator surface.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Operator HTTP server settings.
    pub server: ServerConfig,

    /// Backing-store call settings.
    pub store: StoreConfig,

    /// Payload codec settings.
    pub codec: CodecConfig,

    /// Policy table tuning.
    pub policy: PolicyConfig,

    /// Cache warming settings.
    pub warmer: WarmerConfig,

    /// Policy self-tuning loop settings.
    pub optimizer: OptimizerConfig,
}

/// Operator HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backing-store call settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bound on every individual store call, in milliseconds. A call that
    /// exceeds it is treated as a store failure, which the read path
    /// degrades to a miss.
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { op_timeout_ms: 250 }
    }
}

/// Payload codec settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Serialized payloads above this size get zstd-compressed.
    pub compression_threshold_bytes: usize,

    /// zstd compression level (1-22).
    pub zstd_level: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression_threshold_bytes: 1024,
            zstd_level: 3,
        }
    }
}

/// A policy override applied on top of the built-in per-type defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySeed {
    pub resource_type: ResourceType,

    /// None seeds the type-wide default used when no (type, role) entry
    /// exists.
    pub role: Option<CallerRole>,

    pub ttl_secs: Option<u64>,
    pub max_size_bytes: Option<u64>,
    pub priority: Option<Priority>,
}

/// Policy table tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Self-tuning never reduces a TTL below this floor.
    pub ttl_floor_secs: u64,

    /// TTL shrink factor applied when entries are observed to die early.
    pub ttl_shrink_factor: f64,

    /// Max-size growth factor applied when entries crowd the size ceiling.
    pub max_size_growth_factor: f64,

    /// Per-priority memory budgets in bytes. `Highest` receives
    /// `highest_bonus_factor` times the `High` budget.
    pub budget_low_bytes: u64,
    pub budget_medium_bytes: u64,
    pub budget_high_bytes: u64,
    pub highest_bonus_factor: f64,

    /// Startup overrides applied on top of the built-in defaults.
    pub seeds: Vec<PolicySeed>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            ttl_floor_secs: 60,
            ttl_shrink_factor: 0.8,
            max_size_growth_factor: 1.2,
            budget_low_bytes: 64 * 1024 * 1024,
            budget_medium_bytes: 128 * 1024 * 1024,
            budget_high_bytes: 256 * 1024 * 1024,
            highest_bonus_factor: 1.2,
            seeds: Vec::new(),
        }
    }
}

/// One hot key the warmer keeps populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmTarget {
    pub resource_type: ResourceType,
    pub params: QueryParams,
}

/// Cache warming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmerConfig {
    /// Seconds between warming sweeps.
    pub interval_secs: u64,

    /// Role used for admission when the warmer writes an entry.
    pub warm_role: CallerRole,

    /// Hot (type, canonical-parameter) pairs expected to be frequently
    /// requested.
    pub targets: Vec<WarmTarget>,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            warm_role: CallerRole::Viewer,
            targets: Vec::new(),
        }
    }
}

/// Policy self-tuning loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Seconds between optimization passes over all types.
    pub interval_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { interval_secs: 3600 }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for
    /// missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
