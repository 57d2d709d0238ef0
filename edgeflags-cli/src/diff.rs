use std::collections::HashMap;
use std::process;

use edgeflags_lib::env::{namespaced_key, resolve_environment};
use edgeflags_lib::types::FlagRecord;
use edgeflags_lib::{EdgeStore, RowSource};
use serde_json::{json, Value};

use crate::config::CliConfig;

/// Desired-vs-current without writing anything. Prints a JSON array of
/// `{key, notion, edge}` entries for every key whose values differ.
pub async fn run(config: &CliConfig, env_arg: Option<&str>, namespace_arg: Option<&str>) {
    let source = match config.notion_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let store = match config.edge_store() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let env = resolve_environment(env_arg);
    let namespace = namespace_arg.unwrap_or(&config.sync.namespace);

    let rows = match source.fetch_changed_rows(None).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("diff failed: {}", e);
            process::exit(1);
        }
    };

    let mut desired: HashMap<String, Value> = HashMap::new();
    for row in &rows {
        if !row.envs.iter().any(|e| e == &env) {
            continue;
        }
        let record = FlagRecord::new(row.enabled, row.value.clone(), row.kind);
        let key = namespaced_key(namespace, &env, &row.key);
        desired.insert(key, serde_json::to_value(&record).unwrap_or(Value::Null));
    }

    let keys: Vec<String> = desired.keys().cloned().collect();
    let current = match store.get_items(&keys).await {
        Ok(current) => current,
        Err(e) => {
            eprintln!("diff failed: {}", e);
            process::exit(1);
        }
    };

    let mut diffs = Vec::new();
    let mut sorted_keys = keys;
    sorted_keys.sort();
    for key in &sorted_keys {
        let want = &desired[key];
        let have = current.get(key).and_then(|v| v.clone()).unwrap_or(Value::Null);
        if *want != have {
            diffs.push(json!({ "key": key, "notion": want, "edge": have }));
        }
    }

    match serde_json::to_string_pretty(&diffs) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            eprintln!("diff failed: {}", e);
            process::exit(1);
        }
    }
}
