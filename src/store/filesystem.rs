use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{Store, StoreError, KEY_SEP};

/// A store mapping keys to files below a root directory.
///
/// `/`-separated key segments become path components; intermediate
/// directories are created on `set`. I/O is performed synchronously on the
/// calling task, which is adequate for local paths.
#[derive(Debug)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        let mut path = self.root.clone();
        for segment in key.split(KEY_SEP) {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StoreError::InvalidKey(key.to_owned()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl Store for FilesystemStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match fs::read(self.key_path(key)?) {
            Ok(buf) => Ok(Some(buf.into())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &value)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.key_path(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.key_path(key)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("store")).unwrap();
        block_on(async {
            assert_eq!(store.get("arr/c/0/0").await.unwrap(), None);
            store
                .set("arr/c/0/0", Bytes::from_static(b"chunk"))
                .await
                .unwrap();
            assert!(store.exists("arr/c/0/0").await.unwrap());
            assert_eq!(
                store.get("arr/c/0/0").await.unwrap().unwrap().as_ref(),
                b"chunk"
            );
            store.delete("arr/c/0/0").await.unwrap();
            assert!(!store.exists("arr/c/0/0").await.unwrap());
            store.delete("arr/c/0/0").await.unwrap();
        });
    }

    #[test]
    fn rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();
        block_on(async {
            assert!(store.get("../evil").await.is_err());
            assert!(store.get("").await.is_err());
            assert!(store.get("a//b").await.is_err());
        });
    }
}
