//! Configuration management for Tollgate.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use toll_common::constants::{
    DEFAULT_HARDNESS, DEFAULT_LISTEN_ADDR, DEFAULT_NONCE_BUCKET_SECS, DEFAULT_OLD_KEY_GRACE_SECS,
    DEFAULT_REDIS_URL, DEFAULT_RSA_KEY_BITS, DEFAULT_RSA_KEY_TTL_SECS, DEFAULT_SWEEP_PROBABILITY,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Storage backend: memory, file, or redis
    #[serde(default = "default_storage")]
    pub storage: String,

    /// Root directory for the file backend
    #[serde(default = "default_storage_path")]
    pub storage_path: String,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Puzzle and key-epoch configuration
    #[serde(default)]
    pub puzzle: PuzzleConfig,

    /// Replay store configuration
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Puzzle and key-epoch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PuzzleConfig {
    /// RSA modulus size in bits for site epochs
    #[serde(default = "default_rsa_key_bits")]
    pub rsa_key_bits: usize,

    /// Current-epoch lifetime in seconds
    #[serde(default = "default_rsa_key_ttl")]
    pub rsa_key_ttl_secs: i64,

    /// Previous-epoch validity window, measured from its own creation
    #[serde(default = "default_old_key_grace")]
    pub old_key_grace_secs: i64,

    /// Hardness assigned to newly created sites
    #[serde(default = "default_hardness")]
    pub default_hardness: u64,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            rsa_key_bits: default_rsa_key_bits(),
            rsa_key_ttl_secs: default_rsa_key_ttl(),
            old_key_grace_secs: default_old_key_grace(),
            default_hardness: default_hardness(),
        }
    }
}

/// Replay store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Width of a nonce time bucket in seconds
    #[serde(default = "default_bucket_secs")]
    pub bucket_secs: i64,

    /// Probability that a challenge issuance triggers a sweep
    #[serde(default = "default_sweep_probability")]
    pub sweep_probability: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            bucket_secs: default_bucket_secs(),
            sweep_probability: default_sweep_probability(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}
fn default_storage() -> String {
    "file".to_string()
}
fn default_storage_path() -> String {
    "data".to_string()
}
fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}
fn default_rsa_key_bits() -> usize {
    DEFAULT_RSA_KEY_BITS
}
fn default_rsa_key_ttl() -> i64 {
    DEFAULT_RSA_KEY_TTL_SECS
}
fn default_old_key_grace() -> i64 {
    DEFAULT_OLD_KEY_GRACE_SECS
}
fn default_hardness() -> u64 {
    DEFAULT_HARDNESS
}
fn default_bucket_secs() -> i64 {
    DEFAULT_NONCE_BUCKET_SECS
}
fn default_sweep_probability() -> f64 {
    DEFAULT_SWEEP_PROBABILITY
}

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref storage) = args.storage {
            config.storage = storage.clone();
        }
        if let Some(ref storage_path) = args.storage_path {
            config.storage_path = storage_path.clone();
        }
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            storage: default_storage(),
            storage_path: default_storage_path(),
            redis_url: default_redis_url(),
            puzzle: PuzzleConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}
