use std::process;
use std::sync::Arc;
use std::time::Duration;

use edgeflags_lib::env::resolve_environment;
use edgeflags_lib::{DriftPolicy, RowSource, Syncer};
use tokio::sync::watch;

use crate::config::CliConfig;

pub async fn run(
    config: &CliConfig,
    once: bool,
    env_arg: Option<&str>,
    namespace_arg: Option<&str>,
    interval_ms_arg: Option<u64>,
    drift_arg: Option<DriftPolicy>,
) {
    let source = match config.notion_client() {
        Ok(client) => Arc::new(client) as Arc<dyn RowSource>,
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
    let interval_ms = interval_ms_arg.unwrap_or(config.sync.interval_ms);
    let drift = drift_arg.unwrap_or(config.sync.drift_policy);

    let syncer = Syncer::new(source, store)
        .with_env(&env)
        .with_namespace(namespace)
        .with_interval(Duration::from_millis(interval_ms))
        .with_drift_policy(drift);

    if once {
        match syncer.run_once().await {
            Ok(outcome) => {
                println!(
                    "synced {} flags for {} (fetched {}, checksum {})",
                    outcome.updated, env, outcome.fetched, outcome.checksum
                );
            }
            Err(e) => {
                eprintln!("sync failed: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    // Poll mode: ctrl-c flips the stop signal, the loop drains cleanly.
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Shutdown signal received, stopping after current cycle...");
            let _ = stop_tx.send(true);
        }
    });

    println!("Polling every {}ms for env {} (ctrl-c to stop)", interval_ms, env);
    syncer.run(stop_rx).await;
}
