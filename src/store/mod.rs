pub mod edge_config;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlagsError;

/// One upsert in a batched write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchItem {
    pub key: String,
    pub value: Value,
}

impl PatchItem {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value }
    }
}

/// Key-value store collaborator. Implementations must be thread-safe.
///
/// The syncer is the only writer of flag keys through this trait, aside
/// from the explicit `flip` override.
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Fetch the full item set. Used by the read client's snapshot cache.
    async fn get_all(&self) -> Result<HashMap<String, Value>, FlagsError>;

    /// Fetch current values for exactly the given keys. Absent keys map
    /// to `None`, never omitted from the result.
    async fn get_items(&self, keys: &[String]) -> Result<HashMap<String, Option<Value>>, FlagsError>;

    /// Apply a batch of upserts, all-or-nothing per call.
    async fn patch_items(&self, items: &[PatchItem]) -> Result<(), FlagsError>;
}
