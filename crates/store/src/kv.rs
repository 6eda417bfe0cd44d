use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("stored value could not be decoded: {0}")]
    Codec(String),
}

/// Minimal JSON key-value contract the repository is built on: single-value
/// get/set/delete plus a bounded most-recent-first list per key.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Prepends `value` to the list at `key`.
    async fn push_front(&self, key: &str, value: String) -> Result<(), StoreError>;
    /// Drops list entries beyond the first `max_len`.
    async fn trim_list(&self, key: &str, max_len: usize) -> Result<(), StoreError>;
    /// Reads up to `limit` entries, most recent first.
    async fn read_list(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<T> KvStore for Arc<T>
where
    T: KvStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key).await
    }

    async fn push_front(&self, key: &str, value: String) -> Result<(), StoreError> {
        (**self).push_front(key, value).await
    }

    async fn trim_list(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        (**self).trim_list(key, max_len).await
    }

    async fn read_list(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        (**self).read_list(key, limit).await
    }
}
