use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde_json::Value;

use crate::kv::{KvStore, StoreError};

/// Redis-backed store. The connection manager reconnects on its own, so a
/// clone per command is cheap and the store stays `Sync`.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(backend_error)?;
        let connection = ConnectionManager::new(client).await.map_err(backend_error)?;
        Ok(Self { connection })
    }
}

fn backend_error(error: redis::RedisError) -> StoreError {
    StoreError::Backend(error.to_string())
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(key).await.map_err(backend_error)?;
        raw.map(|text| serde_json::from_str(&text).map_err(|e| StoreError::Codec(e.to_string())))
            .transpose()
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let text = serde_json::to_string(&value).map_err(|e| StoreError::Codec(e.to_string()))?;
        connection.set::<_, _, ()>(key, text).await.map_err(backend_error)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection.del::<_, ()>(key).await.map_err(backend_error)
    }

    async fn push_front(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection.lpush::<_, _, ()>(key, value).await.map_err(backend_error)
    }

    async fn trim_list(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let stop = max_len.saturating_sub(1) as isize;
        connection.ltrim::<_, ()>(key, 0, stop).await.map_err(backend_error)
    }

    async fn read_list(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();
        let stop = limit.saturating_sub(1) as isize;
        connection.lrange::<_, Vec<String>>(key, 0, stop).await.map_err(backend_error)
    }
}
