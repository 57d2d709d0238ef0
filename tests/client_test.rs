use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edgeflags_lib::{
    EdgeStore, FlagRecord, FlagType, FlagsClient, FlagsError, MemoryStore, PatchItem,
};
use serde_json::{json, Value};

async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .seed("flag__production__bool", json!({"enabled": true, "value": true}))
        .await;
    store
        .seed(
            "flag__production__boolStr",
            json!({"enabled": true, "value": "true", "type": "string"}),
        )
        .await;
    store
        .seed(
            "flag__production__num",
            json!({"enabled": true, "value": 42, "type": "number"}),
        )
        .await;
    store
        .seed(
            "flag__production__numStr",
            json!({"enabled": true, "value": "42", "type": "string"}),
        )
        .await;
    store
        .seed(
            "flag__production__str",
            json!({"enabled": true, "value": "x", "type": "string"}),
        )
        .await;
    store
        .seed(
            "flag__production__json",
            json!({"enabled": true, "value": {"a": 1}, "type": "json"}),
        )
        .await;
    store
        .seed(
            "flag__production__jsonStr",
            json!({"enabled": true, "value": "{\"a\":1}", "type": "json"}),
        )
        .await;
    store
        .seed(
            "flag__production__off",
            json!({"enabled": false, "value": "hidden", "type": "string"}),
        )
        .await;
    // Legacy bare scalars from before records were introduced
    store.seed("flag__production__legacyBool", json!(true)).await;
    store.seed("flag__production__legacyStr", json!("hello")).await;
    store.seed("flag__production__legacyZero", json!(0)).await;
    // A different environment that must not leak into the snapshot
    store
        .seed("flag__preview__bool", json!({"enabled": true, "value": false}))
        .await;
    store
}

fn client(store: Arc<MemoryStore>) -> FlagsClient {
    FlagsClient::new(store).with_env("production")
}

#[tokio::test]
async fn typed_accessors_coerce_permissively() {
    let c = client(seeded_store().await);
    assert_eq!(c.get_boolean("bool").await, Some(true));
    assert_eq!(c.get_boolean("boolStr").await, Some(true));
    assert_eq!(c.get_number("num").await, Some(42.0));
    assert_eq!(c.get_number("numStr").await, Some(42.0));
    assert_eq!(c.get_string("str").await, Some("x".to_string()));
    assert_eq!(c.get_json("json").await, Some(json!({"a": 1})));
    assert_eq!(c.get_json("jsonStr").await, Some(json!({"a": 1})));
}

#[tokio::test]
async fn mismatched_coercions_are_none() {
    let c = client(seeded_store().await);
    assert_eq!(c.get_boolean("num").await, None);
    assert_eq!(c.get_string("num").await, None);
    assert_eq!(c.get_number("str").await, None);
    assert_eq!(c.get_json("str").await, None);
}

#[tokio::test]
async fn disabled_and_absent_flags_read_as_nothing() {
    let c = client(seeded_store().await);
    assert!(!c.is_enabled("off").await);
    assert_eq!(c.get_string("off").await, None);
    assert_eq!(c.get_value("off").await, None);
    assert!(!c.is_enabled("missing").await);
    assert_eq!(c.get_value("missing").await, None);
    assert_eq!(c.get_flag("missing").await, None);
}

#[tokio::test]
async fn legacy_bare_values_synthesize_records() {
    let c = client(seeded_store().await);
    assert!(c.is_enabled("legacyBool").await);
    assert_eq!(c.get_boolean("legacyBool").await, Some(true));

    let flag = c.get_flag("legacyStr").await.unwrap();
    assert!(flag.enabled);
    assert_eq!(flag.kind, Some(FlagType::String));
    assert_eq!(c.get_string("legacyStr").await, Some("hello".to_string()));

    // Zero is falsy, so the synthesized kill-switch is off.
    assert!(!c.is_enabled("legacyZero").await);
    assert_eq!(c.get_number("legacyZero").await, None);
}

#[tokio::test]
async fn environments_are_isolated() {
    let store = seeded_store().await;
    let prod = FlagsClient::new(store.clone()).with_env("production");
    let preview = FlagsClient::new(store).with_env("preview");
    assert_eq!(prod.get_boolean("bool").await, Some(true));
    assert_eq!(preview.get_boolean("bool").await, Some(false));
}

#[tokio::test]
async fn get_many_maps_absent_keys_to_none() {
    let c = client(seeded_store().await);
    let out = c.get_many(&["num", "missing"]).await;
    assert_eq!(
        out.get("num").cloned().flatten(),
        Some(json!({"enabled": true, "value": 42, "type": "number"}))
    );
    assert_eq!(out.get("missing").cloned().flatten(), None);
}

#[tokio::test]
async fn upsert_then_get_flag_round_trips() {
    let store = seeded_store().await;
    let record = FlagRecord::new(true, json!({"limit": 10}), Some(FlagType::Json));
    store
        .patch_items(&[PatchItem::new(
            "flag__production__roundtrip",
            serde_json::to_value(&record).unwrap(),
        )])
        .await
        .unwrap();
    let c = client(store);
    assert_eq!(c.get_flag("roundtrip").await, Some(record));
}

#[tokio::test]
async fn stale_snapshot_served_within_ttl() {
    let store = seeded_store().await;
    let c = FlagsClient::new(store.clone())
        .with_env("production")
        .with_ttl(Duration::from_secs(300));
    assert_eq!(c.get_number("num").await, Some(42.0));
    store
        .seed(
            "flag__production__num",
            json!({"enabled": true, "value": 7, "type": "number"}),
        )
        .await;
    // Still inside the freshness window: old snapshot answers.
    assert_eq!(c.get_number("num").await, Some(42.0));
}

#[tokio::test]
async fn zero_ttl_always_refetches() {
    let store = seeded_store().await;
    let c = FlagsClient::new(store.clone())
        .with_env("production")
        .with_ttl(Duration::ZERO);
    assert_eq!(c.get_number("num").await, Some(42.0));
    store
        .seed(
            "flag__production__num",
            json!({"enabled": true, "value": 7, "type": "number"}),
        )
        .await;
    assert_eq!(c.get_number("num").await, Some(7.0));
}

struct UnreachableStore;

#[async_trait]
impl EdgeStore for UnreachableStore {
    async fn get_all(&self) -> Result<HashMap<String, Value>, FlagsError> {
        Err(FlagsError::StoreRead("connection refused".into()))
    }

    async fn get_items(
        &self,
        _keys: &[String],
    ) -> Result<HashMap<String, Option<Value>>, FlagsError> {
        Err(FlagsError::StoreRead("connection refused".into()))
    }

    async fn patch_items(&self, _items: &[PatchItem]) -> Result<(), FlagsError> {
        Err(FlagsError::StoreWrite("connection refused".into()))
    }
}

#[tokio::test]
async fn refresh_failure_degrades_to_empty_not_error() {
    let c = FlagsClient::new(Arc::new(UnreachableStore)).with_env("production");
    assert!(!c.is_enabled("anything").await);
    assert_eq!(c.get_value("anything").await, None);
    let out = c.get_many(&["a", "b"]).await;
    assert_eq!(out.get("a").cloned().flatten(), None);
    assert_eq!(out.get("b").cloned().flatten(), None);
}
