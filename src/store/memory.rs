use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{EdgeStore, PatchItem};
use crate::error::FlagsError;

/// In-memory store backed by a `RwLock<HashMap>`. Used by tests and as a
/// stand-in when no Edge Config connection is configured.
///
/// Keeps a log of every key written so tests can assert on write
/// behavior (sync idempotence, drift policy).
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
    patch_calls: AtomicUsize,
    written_keys: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value directly, bypassing the patch log. This is the
    /// "manual out-of-band write" the drift policy exists to reconcile.
    pub async fn seed(&self, key: impl Into<String>, value: Value) {
        self.data.write().await.insert(key.into(), value);
    }

    pub async fn raw(&self, key: &str) -> Option<Value> {
        self.data.read().await.get(key).cloned()
    }

    pub fn patch_call_count(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    /// Keys written through `patch_items`, filtered by prefix.
    pub async fn writes_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.written_keys
            .read()
            .await
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EdgeStore for MemoryStore {
    async fn get_all(&self) -> Result<HashMap<String, Value>, FlagsError> {
        Ok(self.data.read().await.clone())
    }

    async fn get_items(&self, keys: &[String]) -> Result<HashMap<String, Option<Value>>, FlagsError> {
        let data = self.data.read().await;
        Ok(keys
            .iter()
            .map(|k| (k.clone(), data.get(k).cloned()))
            .collect())
    }

    async fn patch_items(&self, items: &[PatchItem]) -> Result<(), FlagsError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.write().await;
        let mut log = self.written_keys.write().await;
        for item in items {
            data.insert(item.key.clone(), item.value.clone());
            log.push(item.key.clone());
        }
        Ok(())
    }
}
