//! In-memory storage backend for tests and single-process development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use toll_common::TollError;

/// HashMap-backed store. Cheap to clone; all clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> Result<(), TollError> {
        self.entries
            .write()
            .map_err(|e| TollError::Storage(e.to_string()))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, TollError> {
        self.entries
            .read()
            .map_err(|e| TollError::Storage(e.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| TollError::NotFound(key.to_string()))
    }

    pub async fn key_exists(&self, key: &str) -> Result<bool, TollError> {
        Ok(self
            .entries
            .read()
            .map_err(|e| TollError::Storage(e.to_string()))?
            .contains_key(key))
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, TollError> {
        Ok(self
            .entries
            .read()
            .map_err(|e| TollError::Storage(e.to_string()))?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    pub async fn delete(&self, key: &str) -> Result<(), TollError> {
        self.entries
            .write()
            .map_err(|e| TollError::Storage(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
