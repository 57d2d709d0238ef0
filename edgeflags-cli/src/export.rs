use std::process;

use edgeflags_lib::env::{namespaced_key, resolve_environment};
use edgeflags_lib::{EdgeStore, RowSource};
use serde_json::{json, Value};

use crate::config::CliConfig;

/// Dump the current Edge Config values for the environment's keys.
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
            eprintln!("export failed: {}", e);
            process::exit(1);
        }
    };

    let mut keys: Vec<String> = rows
        .iter()
        .filter(|r| r.envs.iter().any(|e| e == &env))
        .map(|r| namespaced_key(namespace, &env, &r.key))
        .collect();
    keys.sort();
    keys.dedup();

    if keys.is_empty() {
        println!("[]");
        return;
    }

    let current = match store.get_items(&keys).await {
        Ok(current) => current,
        Err(e) => {
            eprintln!("export failed: {}", e);
            process::exit(1);
        }
    };

    let out: Vec<Value> = keys
        .iter()
        .map(|key| {
            let value = current.get(key).and_then(|v| v.clone()).unwrap_or(Value::Null);
            json!({ "key": key, "value": value })
        })
        .collect();

    match serde_json::to_string_pretty(&out) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("export failed: {}", e);
            process::exit(1);
        }
    }
}
