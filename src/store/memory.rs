use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::{Store, StoreError};

/// An ephemeral store backed by a hash map, mainly for testing.
///
/// The whole map is locked per operation; operations never await while
/// holding the lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently present, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.map
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Other("store lock poisoned".to_owned())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let map = self.map.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let mut map = self.map.write().map_err(|_| poisoned())?;
        map.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.map.write().map_err(|_| poisoned())?;
        map.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let map = self.map.read().map_err(|_| poisoned())?;
        Ok(map.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn absent_key_semantics() {
        let store = MemoryStore::new();
        block_on(async {
            assert_eq!(store.get("nope").await.unwrap(), None);
            assert!(!store.exists("nope").await.unwrap());
            store.delete("nope").await.unwrap();
        });
    }

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        block_on(async {
            store.set("k", Bytes::from_static(b"v")).await.unwrap();
            assert_eq!(store.get("k").await.unwrap().unwrap().as_ref(), b"v");
            assert_eq!(store.keys(), vec!["k".to_owned()]);
            store.set("k", Bytes::from_static(b"v2")).await.unwrap();
            assert_eq!(store.get("k").await.unwrap().unwrap().as_ref(), b"v2");
            assert_eq!(store.len(), 1);
            store.delete("k").await.unwrap();
            assert!(store.is_empty());
        });
    }
}
