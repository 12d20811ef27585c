//! In-memory [`KvStore`] for tests

use super::store::KvStore;
use crate::error::IpamError;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Map-backed store with the same conditional semantics as etcd
///
/// Clones share data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.data().keys().cloned().collect()
    }

    /// Write a raw value, bypassing the conditional insert (for test setup)
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.data().insert(key.into(), value.into());
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IpamError> {
        Ok(self.data().get(key).cloned())
    }

    async fn create_if_absent(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, IpamError> {
        let mut data = self.data();
        if let Some(existing) = data.get(key) {
            return Ok(Some(existing.clone()));
        }
        data.insert(key.to_string(), value);
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), IpamError> {
        self.data().remove(key);
        Ok(())
    }

    async fn delete_all(&self, keys: &[String]) -> Result<(), IpamError> {
        let mut data = self.data();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }
}
