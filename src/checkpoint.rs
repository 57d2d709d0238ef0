//! Sync metadata persisted in the key-value store itself.
//!
//! Two reserved keys per (namespace, environment): the checkpoint (a
//! clock watermark, ISO-8601) and a summary of the last cycle. No
//! caching here; every call goes to the collaborator.

use serde::{Deserialize, Serialize};

use crate::env::{checkpoint_key, summary_key};
use crate::error::FlagsError;
use crate::store::{EdgeStore, PatchItem};

/// Outcome of the last sync cycle: how many keys changed, when, and a
/// checksum of the post-sync snapshot used to detect external drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub updated: u64,
    pub at: String,
    pub checksum: String,
}

pub async fn read_checkpoint(
    store: &dyn EdgeStore,
    namespace: &str,
    env: &str,
) -> Result<Option<String>, FlagsError> {
    let key = checkpoint_key(namespace, env);
    let items = store.get_items(std::slice::from_ref(&key)).await?;
    Ok(items
        .get(&key)
        .and_then(|v| v.as_ref())
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from))
}

pub async fn write_checkpoint(
    store: &dyn EdgeStore,
    namespace: &str,
    env: &str,
    iso: &str,
) -> Result<(), FlagsError> {
    let item = PatchItem::new(checkpoint_key(namespace, env), iso.into());
    store.patch_items(&[item]).await
}

pub async fn write_summary(
    store: &dyn EdgeStore,
    namespace: &str,
    env: &str,
    summary: &SyncSummary,
) -> Result<(), FlagsError> {
    let value = serde_json::to_value(summary)
        .map_err(|e| FlagsError::StoreWrite(e.to_string()))?;
    let item = PatchItem::new(summary_key(namespace, env), value);
    store.patch_items(&[item]).await
}

pub async fn read_summary(
    store: &dyn EdgeStore,
    namespace: &str,
    env: &str,
) -> Result<Option<SyncSummary>, FlagsError> {
    let key = summary_key(namespace, env);
    let items = store.get_items(std::slice::from_ref(&key)).await?;
    Ok(items
        .get(&key)
        .and_then(|v| v.clone())
        .and_then(|v| serde_json::from_value(v).ok()))
}
