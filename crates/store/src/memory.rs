use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::kv::{KvStore, StoreError};

/// HashMap-backed store for tests and tokenless local runs.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Value>>,
    lists: RwLock<HashMap<String, Vec<String>>>,
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn push_front(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut lists = self.lists.write().await;
        lists.entry(key.to_owned()).or_default().insert(0, value);
        Ok(())
    }

    async fn trim_list(&self, key: &str, max_len: usize) -> Result<(), StoreError> {
        let mut lists = self.lists.write().await;
        if let Some(list) = lists.get_mut(key) {
            list.truncate(max_len);
        }
        Ok(())
    }

    async fn read_list(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.read().await;
        Ok(lists.get(key).map(|list| list.iter().take(limit).cloned().collect()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kv::KvStore;

    use super::InMemoryStore;

    #[tokio::test]
    async fn value_round_trip_and_delete() {
        let store = InMemoryStore::default();

        store.set("inv:1:A", json!({"total": 5})).await.expect("set");
        assert_eq!(store.get("inv:1:A").await.expect("get"), Some(json!({"total": 5})));

        store.delete("inv:1:A").await.expect("delete");
        assert_eq!(store.get("inv:1:A").await.expect("get"), None);
    }

    #[tokio::test]
    async fn list_is_most_recent_first_and_trimmed() {
        let store = InMemoryStore::default();
        for id in ["A", "B", "C"] {
            store.push_front("invlist:1", id.to_owned()).await.expect("push");
        }

        assert_eq!(store.read_list("invlist:1", 2).await.expect("read"), vec!["C", "B"]);

        store.trim_list("invlist:1", 2).await.expect("trim");
        assert_eq!(store.read_list("invlist:1", 10).await.expect("read"), vec!["C", "B"]);
    }
}
