//! Reconciliation engine: Notion rows → Edge Config keys.
//!
//! One cycle is read checkpoint → fetch changed rows → map to namespaced
//! keys → diff against current values → apply drift policy → batched
//! upsert → advance checkpoint + summary. Any collaborator failure aborts
//! the cycle before the checkpoint is touched, so a failed cycle is
//! retried in full on the next scheduled attempt.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};
use tokio::sync::watch;

use crate::checkpoint::{read_checkpoint, write_checkpoint, write_summary, SyncSummary};
use crate::env::{namespaced_key, resolve_environment, DEFAULT_NAMESPACE};
use crate::error::FlagsError;
use crate::notion::{FlagRow, RowSource};
use crate::store::{EdgeStore, PatchItem};
use crate::types::FlagRecord;

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// What to do when a mapped key already holds a different value.
///
/// `PreferNotion` writes every changed key (the document store wins).
/// `PreferEdgeConfig` and `ReportOnly` both leave the existing value
/// alone: a conflicting value is never silently overwritten unless the
/// policy explicitly says the source of truth should win.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftPolicy {
    #[default]
    PreferNotion,
    PreferEdgeConfig,
    ReportOnly,
}

impl FromStr for DriftPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefer-notion" => Ok(Self::PreferNotion),
            "prefer-edge-config" => Ok(Self::PreferEdgeConfig),
            "report-only" => Ok(Self::ReportOnly),
            other => Err(format!(
                "unknown drift policy '{}' (expected prefer-notion, prefer-edge-config or report-only)",
                other
            )),
        }
    }
}

/// Result of one successful cycle.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub fetched: usize,
    pub updated: u64,
    pub at: String,
    pub checksum: String,
}

pub struct Syncer {
    source: Arc<dyn RowSource>,
    store: Arc<dyn EdgeStore>,
    namespace: String,
    env: String,
    interval: Duration,
    drift: DriftPolicy,
}

impl Syncer {
    pub fn new(source: Arc<dyn RowSource>, store: Arc<dyn EdgeStore>) -> Self {
        Self {
            source,
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            env: resolve_environment(None),
            interval: DEFAULT_POLL_INTERVAL,
            drift: DriftPolicy::default(),
        }
    }

    pub fn with_env(mut self, env: &str) -> Self {
        self.env = env.to_string();
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Sleep between poll cycles, clamped to a 1 second minimum.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_drift_policy(mut self, drift: DriftPolicy) -> Self {
        self.drift = drift;
        self
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    /// Map fetched rows to their namespaced key/record pairs, dropping
    /// rows not tagged with the target environment.
    fn map_rows(&self, rows: &[FlagRow]) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        for row in rows {
            if !row.envs.iter().any(|e| e == &self.env) {
                continue;
            }
            let record = FlagRecord::new(row.enabled, row.value.clone(), row.kind);
            let key = namespaced_key(&self.namespace, &self.env, &row.key);
            // serde_json::to_value of a FlagRecord cannot fail
            out.insert(key, serde_json::to_value(&record).unwrap_or(Value::Null));
        }
        out
    }

    /// Run one full reconciliation cycle.
    ///
    /// The checkpoint is a clock watermark: it advances after every
    /// successful cycle even when nothing changed, and never advances on
    /// a mid-cycle failure.
    pub async fn run_once(&self) -> Result<SyncOutcome, FlagsError> {
        let since = read_checkpoint(self.store.as_ref(), &self.namespace, &self.env).await?;
        let rows = self.source.fetch_changed_rows(since.as_deref()).await?;
        let desired = self.map_rows(&rows);
        let keys: Vec<String> = desired.keys().cloned().collect();

        let mut updated = 0u64;
        if !keys.is_empty() {
            let current = self.store.get_items(&keys).await?;
            let mut changed = Vec::new();
            for key in &keys {
                let want = &desired[key];
                let have = current.get(key).and_then(|v| v.as_ref());
                if have == Some(want) {
                    continue;
                }
                match self.drift {
                    DriftPolicy::PreferNotion => {
                        changed.push(PatchItem::new(key.clone(), want.clone()));
                    }
                    DriftPolicy::PreferEdgeConfig | DriftPolicy::ReportOnly => {
                        println!("Syncer: drift on {} left in place", key);
                    }
                }
            }
            if !changed.is_empty() {
                self.store.patch_items(&changed).await?;
                updated = changed.len() as u64;
            }
        }

        // Checksum the post-apply snapshot for the mapped keys so the next
        // cycle can tell expected state from external drift.
        let after = self.store.get_items(&keys).await?;
        let checksum = snapshot_checksum(&after);
        let now = chrono::Utc::now().to_rfc3339();
        write_checkpoint(self.store.as_ref(), &self.namespace, &self.env, &now).await?;
        let summary = SyncSummary {
            updated,
            at: now.clone(),
            checksum: checksum.clone(),
        };
        write_summary(self.store.as_ref(), &self.namespace, &self.env, &summary).await?;

        Ok(SyncOutcome {
            fetched: rows.len(),
            updated,
            at: now,
            checksum,
        })
    }

    /// Poll loop: run cycles until the stop signal flips.
    ///
    /// Per-cycle errors are logged and swallowed; the next scheduled
    /// cycle is the only retry. The stop receiver is checked before each
    /// cycle and raced against the inter-cycle sleep, so hosts can shut
    /// the loop down promptly.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }
            match self.run_once().await {
                Ok(outcome) => {
                    println!(
                        "Syncer: synced {} flags for {} (checksum {})",
                        outcome.updated, self.env, outcome.checksum
                    );
                }
                Err(e) => eprintln!("Syncer: cycle failed: {}", e),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        println!("Syncer: stopped");
    }
}

/// Deterministic digest over the sorted (key, value) pairs of a snapshot.
/// Absent keys are folded in as null so the digest is stable regardless
/// of which side omitted them.
pub fn snapshot_checksum(snapshot: &HashMap<String, Option<Value>>) -> String {
    let mut pairs: Vec<(&String, Value)> = snapshot
        .iter()
        .map(|(k, v)| (k, v.clone().unwrap_or(Value::Null)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    // serde_json object keys are ordered, so this serialization is canonical
    let data = serde_json::to_string(&pairs).unwrap_or_default();

    let mut hasher = Sha1::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_deterministic_and_order_independent() {
        let mut a = HashMap::new();
        a.insert("x".to_string(), Some(json!(1)));
        a.insert("y".to_string(), Some(json!({"b": 2, "a": 1})));
        let mut b = HashMap::new();
        b.insert("y".to_string(), Some(json!({"a": 1, "b": 2})));
        b.insert("x".to_string(), Some(json!(1)));
        assert_eq!(snapshot_checksum(&a), snapshot_checksum(&b));
    }

    #[test]
    fn test_checksum_changes_with_values() {
        let mut a = HashMap::new();
        a.insert("x".to_string(), Some(json!(1)));
        let mut b = HashMap::new();
        b.insert("x".to_string(), Some(json!(2)));
        assert_ne!(snapshot_checksum(&a), snapshot_checksum(&b));
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let source: Arc<dyn RowSource> = Arc::new(NoRows);
        let store = Arc::new(crate::store::memory::MemoryStore::new());
        let syncer = Syncer::new(source, store).with_interval(Duration::from_millis(10));
        assert_eq!(syncer.interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_drift_policy_from_str() {
        assert_eq!("prefer-notion".parse::<DriftPolicy>().unwrap(), DriftPolicy::PreferNotion);
        assert_eq!(
            "prefer-edge-config".parse::<DriftPolicy>().unwrap(),
            DriftPolicy::PreferEdgeConfig
        );
        assert_eq!("report-only".parse::<DriftPolicy>().unwrap(), DriftPolicy::ReportOnly);
        assert!("wins".parse::<DriftPolicy>().is_err());
    }

    struct NoRows;

    #[async_trait::async_trait]
    impl RowSource for NoRows {
        async fn fetch_changed_rows(&self, _since: Option<&str>) -> Result<Vec<FlagRow>, FlagsError> {
            Ok(Vec::new())
        }
    }
}
