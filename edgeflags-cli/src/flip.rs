use std::process;

use edgeflags_lib::env::{namespaced_key, resolve_environment};
use edgeflags_lib::types::{infer_type, FlagRecord};
use edgeflags_lib::{EdgeStore, PatchItem};
use serde_json::Value;

use crate::config::CliConfig;

/// Parse a CLI value the forgiving way: booleans and numbers first, then
/// JSON, falling back to a bare string.
fn parse_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return Value::Number(num);
        }
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub async fn run(
    config: &CliConfig,
    key: &str,
    env_arg: Option<&str>,
    value_arg: Option<&str>,
    enabled_arg: Option<bool>,
    namespace_arg: Option<&str>,
) {
    let store = match config.edge_store() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let env = resolve_environment(env_arg);
    let namespace = namespace_arg.unwrap_or(&config.sync.namespace);
    let ns_key = namespaced_key(namespace, &env, key);

    let current = match store.get_items(std::slice::from_ref(&ns_key)).await {
        Ok(items) => items.get(&ns_key).cloned().flatten(),
        Err(e) => {
            eprintln!("failed to read {}: {}", ns_key, e);
            process::exit(1);
        }
    };

    let mut record = match &current {
        Some(stored) => FlagRecord::from_stored(stored),
        None => FlagRecord::new(true, Value::Null, None),
    };

    match (value_arg, enabled_arg) {
        (None, None) => {
            // No override given: toggle the kill-switch.
            record.enabled = !record.enabled;
        }
        (value, enabled) => {
            if let Some(raw) = value {
                let new_value = parse_value(raw);
                // Preserve the existing type unless the new value clearly
                // infers a different one.
                if let Some(new_kind) = infer_type(&new_value) {
                    if record.kind != Some(new_kind) {
                        record.kind = Some(new_kind);
                    }
                }
                record.value = new_value;
            }
            if let Some(enabled) = enabled {
                record.enabled = enabled;
            }
        }
    }

    let stored = match serde_json::to_value(&record) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("failed to serialize record: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = store.patch_items(&[PatchItem::new(ns_key.clone(), stored)]).await {
        eprintln!("failed to write {}: {}", ns_key, e);
        process::exit(1);
    }
    println!(
        "updated {} (enabled={}, value={})",
        ns_key, record.enabled, record.value
    );
}
