//! Application state and shared resources.

use anyhow::{Context, Result, bail};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::puzzle::{ChallengeGenerator, ProofVerifier, TrapdoorVerifier};
use crate::replay::ReplayGuard;
use crate::sites::SiteRegistry;
use crate::store::{FileStore, MemoryStore, RedisStore, Store};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Site registry
    pub registry: Arc<SiteRegistry>,

    /// Challenge generator
    pub generator: Arc<ChallengeGenerator>,

    /// Proof verifier
    pub verifier: Arc<ProofVerifier>,
}

impl AppState {
    /// Create new application state, opening the configured backend
    pub async fn new(config: AppConfig) -> Result<Self> {
        let store = match config.storage.as_str() {
            "memory" => Store::Memory(MemoryStore::new()),
            "file" => Store::File(
                FileStore::open(&config.storage_path)
                    .await
                    .context("Failed to open file storage root")?,
            ),
            "redis" => Store::Redis(
                RedisStore::connect(&config.redis_url)
                    .await
                    .context("Failed to connect to Redis")?,
            ),
            other => bail!("Unknown storage backend `{other}'"),
        };

        let registry = Arc::new(SiteRegistry::new(
            store.clone(),
            config.puzzle.rsa_key_bits,
            config.puzzle.rsa_key_ttl_secs,
            config.puzzle.default_hardness,
        ));
        let replay = Arc::new(ReplayGuard::new(store, config.replay.bucket_secs));

        let generator = Arc::new(ChallengeGenerator::new(
            registry.clone(),
            replay.clone(),
            config.replay.sweep_probability,
        ));
        let verifier = Arc::new(ProofVerifier::new(
            registry.clone(),
            replay,
            Arc::new(TrapdoorVerifier),
            config.puzzle.rsa_key_ttl_secs,
            config.puzzle.old_key_grace_secs,
        ));

        Ok(Self {
            config,
            registry,
            generator,
            verifier,
        })
    }
}
