//! Read-optimized flag client for request-serving call sites.
//!
//! Holds a time-bounded snapshot of every flag for one
//! (namespace, environment) pair. Refresh failures never propagate;
//! a request must not fail because the flag store is unreachable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;

use crate::env::{namespaced_key, resolve_environment, DEFAULT_NAMESPACE};
use crate::store::EdgeStore;
use crate::types::{coerce_bool, FlagRecord, FlagValue};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

struct CacheState {
    flags: Option<HashMap<String, Value>>,
    fetched_at: Option<Instant>,
}

pub struct FlagsClient {
    store: Arc<dyn EdgeStore>,
    namespace: String,
    env: String,
    ttl: Duration,
    cache: RwLock<CacheState>,
}

impl FlagsClient {
    pub fn new(store: Arc<dyn EdgeStore>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            env: resolve_environment(None),
            ttl: DEFAULT_CACHE_TTL,
            cache: RwLock::new(CacheState {
                flags: None,
                fetched_at: None,
            }),
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

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Refresh the snapshot when it is older than the freshness window.
    ///
    /// The new map is built completely before being swapped in, so
    /// concurrent readers see either the old snapshot or the new one.
    /// On fetch failure the stale snapshot (or an empty one) is kept and
    /// the clock is bumped so an unreachable store is not hammered on
    /// every read.
    async fn ensure_cache(&self) {
        {
            let cache = self.cache.read().await;
            if let (Some(_), Some(at)) = (&cache.flags, cache.fetched_at) {
                if at.elapsed() < self.ttl {
                    return;
                }
            }
        }

        let prefix = format!("{}__{}__", self.namespace, self.env);
        match self.store.get_all().await {
            Ok(all) => {
                let fresh: HashMap<String, Value> = all
                    .into_iter()
                    .filter_map(|(key, value)| {
                        key.strip_prefix(&prefix)
                            .map(|short| (short.to_string(), value))
                    })
                    .collect();
                let mut cache = self.cache.write().await;
                cache.flags = Some(fresh);
                cache.fetched_at = Some(Instant::now());
            }
            Err(e) => {
                eprintln!("FlagsClient: refresh failed: {}", e);
                let mut cache = self.cache.write().await;
                if cache.flags.is_none() {
                    cache.flags = Some(HashMap::new());
                }
                cache.fetched_at = Some(Instant::now());
            }
        }
    }

    async fn cached(&self, key: &str) -> Option<Value> {
        self.ensure_cache().await;
        let cache = self.cache.read().await;
        cache.flags.as_ref()?.get(key).cloned()
    }

    /// The raw flag record, synthesizing one from a legacy bare scalar.
    pub async fn get_flag(&self, key: &str) -> Option<FlagRecord> {
        let stored = self.cached(key).await?;
        if stored.is_null() {
            return None;
        }
        Some(FlagRecord::from_stored(&stored))
    }

    /// Whether the flag exists and its kill-switch is on. Absent is false.
    pub async fn is_enabled(&self, key: &str) -> bool {
        self.get_flag(key).await.map(|f| f.enabled).unwrap_or(false)
    }

    /// The flag's raw value; `None` when the flag is absent or disabled.
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        let flag = self.get_flag(key).await.filter(|f| f.enabled)?;
        if flag.value.is_null() {
            None
        } else {
            Some(flag.value)
        }
    }

    async fn enabled_value(&self, key: &str) -> Option<FlagValue> {
        let flag = self.get_flag(key).await.filter(|f| f.enabled)?;
        Some(flag.classify())
    }

    pub async fn get_boolean(&self, key: &str) -> Option<bool> {
        match self.enabled_value(key).await? {
            FlagValue::Bool(b) => Some(b),
            FlagValue::String(s) => coerce_bool(&Value::String(s)),
            _ => None,
        }
    }

    pub async fn get_string(&self, key: &str) -> Option<String> {
        match self.enabled_value(key).await? {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub async fn get_number(&self, key: &str) -> Option<f64> {
        match self.enabled_value(key).await? {
            FlagValue::Number(n) => Some(n),
            FlagValue::Percent(p) => Some(p as f64),
            FlagValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    pub async fn get_json(&self, key: &str) -> Option<Value> {
        match self.enabled_value(key).await? {
            FlagValue::Json(v) => Some(v),
            FlagValue::Rules(rules) => serde_json::to_value(rules).ok(),
            FlagValue::String(s) => serde_json::from_str(&s).ok(),
            _ => None,
        }
    }

    /// Batch accessor over the cached snapshot. Absent keys map to `None`.
    pub async fn get_many(&self, keys: &[&str]) -> HashMap<String, Option<Value>> {
        self.ensure_cache().await;
        let cache = self.cache.read().await;
        keys.iter()
            .map(|k| {
                let value = cache
                    .flags
                    .as_ref()
                    .and_then(|flags| flags.get(*k).cloned());
                (k.to_string(), value)
            })
            .collect()
    }

    /// The fully-qualified store key for a flag in this client's scope.
    pub fn qualified_key(&self, key: &str) -> String {
        namespaced_key(&self.namespace, &self.env, key)
    }
}
