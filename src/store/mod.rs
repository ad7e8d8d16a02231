use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "filesystem")]
pub mod filesystem;
#[cfg(feature = "filesystem")]
pub use filesystem::FilesystemStore;

/// Key under a node's prefix holding its metadata document.
pub const ZARR_JSON: &str = "zarr.json";

pub(crate) const KEY_SEP: &str = "/";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid store key {0:?}")]
    InvalidKey(String),
    #[error("store error: {0}")]
    Other(String),
}

/// Minimal key-value contract the engine drives chunk and metadata I/O
/// through.
///
/// Keys are arbitrary `/`-separated strings; values are byte strings.
/// An absent key is not an error: `get` returns [None] and `delete` is a
/// no-op.
#[async_trait]
pub trait Store: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// A handle to one key (or key prefix) within a store.
///
/// Composition with [StorePath::join] appends a relative segment; all I/O
/// on the handle targets its full key.
#[derive(Clone, Debug)]
pub struct StorePath {
    store: Arc<dyn Store>,
    path: String,
}

impl StorePath {
    /// A path at the root of the store (the empty key).
    pub fn root(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            path: String::new(),
        }
    }

    pub fn new(store: Arc<dyn Store>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// A new path with `key` appended below this one.
    pub fn join(&self, key: &str) -> Self {
        let path = if self.path.is_empty() {
            key.to_owned()
        } else {
            format!("{}{}{}", self.path, KEY_SEP, key)
        };
        Self {
            store: self.store.clone(),
            path,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn get(&self) -> Result<Option<Bytes>, StoreError> {
        self.store.get(&self.path).await
    }

    pub async fn set(&self, value: Bytes) -> Result<(), StoreError> {
        self.store.set(&self.path, value).await
    }

    pub async fn delete(&self) -> Result<(), StoreError> {
        self.store.delete(&self.path).await
    }

    pub async fn exists(&self) -> Result<bool, StoreError> {
        self.store.exists(&self.path).await
    }
}

impl Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn join_builds_keys() {
        let store = Arc::new(MemoryStore::new());
        let root = StorePath::root(store);
        assert_eq!(root.path(), "");
        let arr = root.join("group").join("arr");
        assert_eq!(arr.path(), "group/arr");
        assert_eq!(arr.join(ZARR_JSON).path(), "group/arr/zarr.json");
        assert_eq!(arr.join("c.0.1").path(), "group/arr/c.0.1");
    }

    #[test]
    fn path_io_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let p = StorePath::root(store).join("a").join("b");
        block_on(async {
            assert!(!p.exists().await.unwrap());
            assert_eq!(p.get().await.unwrap(), None);
            p.set(Bytes::from_static(b"contents")).await.unwrap();
            assert!(p.exists().await.unwrap());
            assert_eq!(p.get().await.unwrap().unwrap().as_ref(), b"contents");
            p.delete().await.unwrap();
            assert!(!p.exists().await.unwrap());
            // deleting an absent key is a no-op
            p.delete().await.unwrap();
        });
    }
}
