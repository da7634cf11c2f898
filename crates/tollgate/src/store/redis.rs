//! Redis storage backend.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use toll_common::TollError;

fn redis_err(e: redis::RedisError) -> TollError {
    TollError::Storage(e.to_string())
}

/// Redis-backed store using an auto-reconnecting connection manager.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, TollError> {
        let client = redis::Client::open(url).map_err(redis_err)?;
        let conn = ConnectionManager::new(client).await.map_err(redis_err)?;
        Ok(Self { conn })
    }

    pub async fn put(&self, key: &str, value: &[u8]) -> Result<(), TollError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(redis_err)
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, TollError> {
        let mut conn = self.conn.clone();
        let data: Option<Vec<u8>> = conn.get(key).await.map_err(redis_err)?;
        data.ok_or_else(|| TollError::NotFound(key.to_string()))
    }

    pub async fn key_exists(&self, key: &str) -> Result<bool, TollError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(redis_err)
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>, TollError> {
        let mut conn = self.conn.clone();
        conn.keys(format!("{prefix}*")).await.map_err(redis_err)
    }

    pub async fn delete(&self, key: &str) -> Result<(), TollError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(redis_err)
    }
}
