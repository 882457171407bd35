use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::StorageError;

/// Private key/value storage of a room.
///
/// Values are opaque bytes. `get` distinguishes an absent key (`Ok(None)`)
/// from a backend fault (`Err`), callers rely on that to tell a first run
/// from a failure. Implementations are shared behind an `Arc` and must be
/// safe to call from several rooms at once.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError>;

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StorageError>;

    /// Removes `key`, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    async fn delete_all(&self) -> Result<(), StorageError>;
}

/// In-process storage that lives as long as its room. Never fails.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StorageError> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StorageError> {
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.lock().remove(key).is_some())
    }

    async fn delete_all(&self) -> Result<(), StorageError> {
        self.data.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let storage = MemoryStorage::new();
        storage.put("k", Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));

        assert!(storage.delete("k").await.unwrap());
        assert_eq!(storage.get("k").await.unwrap(), None);
        assert!(!storage.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn absent_key_is_not_an_error() {
        let storage = MemoryStorage::new();
        assert!(matches!(storage.get("missing").await, Ok(None)));
    }

    #[tokio::test]
    async fn delete_all_empties_the_store() {
        let storage = MemoryStorage::new();
        storage.put("a", Bytes::from_static(b"1")).await.unwrap();
        storage.put("b", Bytes::from_static(b"2")).await.unwrap();
        assert_eq!(storage.len(), 2);

        storage.delete_all().await.unwrap();
        assert!(storage.is_empty());
        assert_eq!(storage.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_previous_value() {
        let storage = MemoryStorage::new();
        storage.put("k", Bytes::from_static(b"old")).await.unwrap();
        storage.put("k", Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), Some(Bytes::from_static(b"new")));
    }
}
