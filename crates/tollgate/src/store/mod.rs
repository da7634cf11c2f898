//! Key-value persistence behind the protocol engine.
//!
//! Every record the engine owns (site documents, replay nonces) goes
//! through this interface: `put`/`get`/`key_exists`/`list`/`delete` over
//! flat string keys. `get` of an absent key is `NotFound`, which callers
//! treat differently from a transport failure.

mod file;
mod memory;
mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use redis::RedisStore;

use toll_common::TollError;

/// Storage backend, selected by configuration at startup.
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    File(FileStore),
    Redis(RedisStore),
}

impl Store {
    pub async fn put(&self, key: &str, value: &[u8]) -> Result<(), TollError> {
        match self {
            Store::Memory(s) => s.put(key, value).await,
            Store::File(s) => s.put(key, value).await,
            Store::Redis(s) => s.put(key, value).await,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, TollError> {
        match self {
            Store::Memory(s) => s.get(key).await,
            Store::File(s) => s.get(key).await,
            Store::Redis(s) => s.get(key).await,
        }
    }

    pub async fn key_exists(&self, key: &str) -> Result<bool, TollError> {
        match self {
            Store::Memory(s) => s.key_exists(key).await,
            Store::File(s) => s.key_exists(key).await,
            Store::Redis(s) => s.key_exists(key).await,
        }
    }

    /// List stored keys under a prefix.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, TollError> {
        match self {
            Store::Memory(s) => s.list(prefix).await,
            Store::File(s) => s.list(prefix).await,
            Store::Redis(s) => s.list(prefix).await,
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), TollError> {
        match self {
            Store::Memory(s) => s.delete(key).await,
            Store::File(s) => s.delete(key).await,
            Store::Redis(s) => s.delete(key).await,
        }
    }
}
